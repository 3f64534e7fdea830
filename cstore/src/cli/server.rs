use clap::ArgMatches;
use server::Config;

/// Starts the server. Flags override the `CSTORE_*` environment variables.
pub async fn run(matches: &ArgMatches) {
    server::init_logging();

    let mut config = Config::from_env();
    if let Some(port) = matches.get_one::<String>("port") {
        config.port = port.clone();
    }
    if let Some(data_dir) = matches.get_one::<String>("data") {
        config.data_dir = data_dir.clone();
    }
    if let Some(blob_dir) = matches.get_one::<String>("blobs") {
        config.blob_dir = blob_dir.clone();
    }
    if let Some(chunk_size) = matches.get_one::<String>("chunk") {
        match chunk_size.parse::<usize>() {
            Ok(size) if size > 0 => config.chunk_size = size,
            _ => println!("invalid chunk size '{chunk_size}', using {}", config.chunk_size),
        }
    }

    server::run_with(config).await;
}
