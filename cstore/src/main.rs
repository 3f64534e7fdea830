use clap::{arg, command, crate_name, Command};
use cli::client::{delete_file, file_meta, get_file, insert_single_file, list_buckets, list_files};
use client::FileParams;

mod cli;

#[tokio::main]
async fn main() {
    let cli = command!(crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand(Command::new(cli::VERSION_SUBCOMMAND).about(cli::VERSION_DESCRIPTION))
        .subcommand(Command::new(cli::BUGREPORT_SUBCOMMAND).about(cli::BUGREPORT_DESCRIPTION))
        .subcommand(
            Command::new(cli::SERVER_SUBCOMMAND)
                .about(cli::SERVER_DESCRIPTION)
                .arg(arg!(-p --port <PORT>).required(false).help("Port to listen on"))
                .arg(
                    arg!(-d --data <DIR>)
                        .required(false)
                        .help("Directory the ledger database lives in"),
                )
                .arg(
                    arg!(-b --blobs <DIR>)
                        .required(false)
                        .help("Directory chunk blobs are stored in"),
                )
                .arg(
                    arg!(-c --chunk <BYTES>)
                        .required(false)
                        .help("Fixed chunk size in bytes"),
                ),
        )
        .subcommand(
            Command::new(cli::INSERT_SUBCOMMAND)
                .about(cli::INSERT_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cstore URI"))
                .subcommand(
                    Command::new(cli::FILE_SUBCOMMAND)
                        .about(cli::INSERT_FILE_DESCRIPTION)
                        .arg(
                            arg!(-f --file <FILE>)
                                .required(true)
                                .help("Path to file to insert"),
                        )
                        .arg(
                            arg!(-b --bucket <BUCKET>)
                                .required(true)
                                .help("Bucket to insert the file"),
                        ),
                ),
        )
        .subcommand(
            Command::new(cli::LIST_SUBCOMMAND)
                .about(cli::LIST_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cstore URI"))
                .subcommand(
                    Command::new(cli::BUCKET_SUBCOMMAND).about(cli::BUCKET_LIST_DESCRIPTION),
                )
                .subcommand(
                    Command::new(cli::FILES_SUBCOMMAND)
                        .about(cli::FILES_LIST_DESCRIPTION)
                        .arg(
                            arg!(-b --bucket <BUCKET>)
                                .required(true)
                                .help("Bucket to list files from"),
                        ),
                ),
        )
        .subcommand(
            Command::new(cli::GET_SUBCOMMAND)
                .about(cli::GET_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cstore URI"))
                .arg(arg!(-i --id <ID>).required(true).help("File id"))
                .arg(
                    arg!(-o --output <FILE>)
                        .required(true)
                        .help("Path to save the downloaded file to"),
                ),
        )
        .subcommand(
            Command::new(cli::META_SUBCOMMAND)
                .about(cli::META_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cstore URI"))
                .arg(arg!(-i --id <ID>).required(true).help("File id")),
        )
        .subcommand(
            Command::new(cli::RM_SUBCOMMAND)
                .about(cli::RM_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cstore URI"))
                .arg(arg!(-i --id <ID>).required(true).help("File id")),
        )
        .arg_required_else_help(true)
        .disable_version_flag(true)
        .get_matches();

    if cli.subcommand_matches(cli::VERSION_SUBCOMMAND).is_some() {
        cli::version::run();
    } else if cli.subcommand_matches(cli::BUGREPORT_SUBCOMMAND).is_some() {
        cli::bugreport::run();
    } else if let Some(server_matches) = cli.subcommand_matches(cli::SERVER_SUBCOMMAND) {
        cli::server::run(server_matches).await;
    } else if let Some(insert_matches) = cli.subcommand_matches(cli::INSERT_SUBCOMMAND) {
        let uri = insert_matches.get_one::<String>("uri").unwrap();
        if let Some(file_matches) = insert_matches.subcommand_matches(cli::FILE_SUBCOMMAND) {
            let file = file_matches.get_one::<String>("file").unwrap();
            let bucket = file_matches.get_one::<String>("bucket").unwrap();
            let params = FileParams {
                uri: uri.clone(),
                file: file.clone(),
                bucket: bucket.clone(),
            };
            insert_single_file(params).await;
        }
    } else if let Some(list_matches) = cli.subcommand_matches(cli::LIST_SUBCOMMAND) {
        let uri = list_matches.get_one::<String>("uri").unwrap();
        if list_matches
            .subcommand_matches(cli::BUCKET_SUBCOMMAND)
            .is_some()
        {
            list_buckets(uri).await;
        } else if let Some(files_matches) = list_matches.subcommand_matches(cli::FILES_SUBCOMMAND) {
            let bucket = files_matches.get_one::<String>("bucket").unwrap();
            list_files(uri, bucket).await;
        }
    } else if let Some(get_matches) = cli.subcommand_matches(cli::GET_SUBCOMMAND) {
        let uri = get_matches.get_one::<String>("uri").unwrap();
        let id = get_matches.get_one::<String>("id").unwrap();
        let output = get_matches.get_one::<String>("output").unwrap();
        match id.parse::<i64>() {
            Ok(id) => get_file(uri, id, output).await,
            Err(_) => println!("invalid file id: {id}"),
        }
    } else if let Some(meta_matches) = cli.subcommand_matches(cli::META_SUBCOMMAND) {
        let uri = meta_matches.get_one::<String>("uri").unwrap();
        let id = meta_matches.get_one::<String>("id").unwrap();
        match id.parse::<i64>() {
            Ok(id) => file_meta(uri, id).await,
            Err(_) => println!("invalid file id: {id}"),
        }
    } else if let Some(rm_matches) = cli.subcommand_matches(cli::RM_SUBCOMMAND) {
        let uri = rm_matches.get_one::<String>("uri").unwrap();
        let id = rm_matches.get_one::<String>("id").unwrap();
        match id.parse::<i64>() {
            Ok(id) => delete_file(uri, id).await,
            Err(_) => println!("invalid file id: {id}"),
        }
    }
}
