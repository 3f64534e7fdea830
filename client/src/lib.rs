use std::path::PathBuf;

use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Attribute, Cell, ContentArrangement, Table};
use kernel::{Bucket, DeleteResult, File, UploadResult};
use reqwest::Client;
use resource::Resource;
use tokio_util::io::ReaderStream;

pub mod resource;

pub struct FileParams {
    pub uri: String,
    pub file: String,
    pub bucket: String,
}

pub async fn insert_file(params: FileParams) {
    let path = PathBuf::from(&params.file);
    let file_name = path.file_name().unwrap_or_default().to_os_string();
    let file_name = file_name.to_str().unwrap_or_default();
    let file_url = urlencoding::encode(file_name);

    let mut resource = match Resource::new(&params.uri) {
        Some(r) => r,
        None => {
            println!("invalid uri: {}", params.uri);
            return;
        }
    };
    resource
        .append_path("api")
        .append_path(&params.bucket)
        .append_path(&file_url);

    let f = match tokio::fs::File::open(&params.file).await {
        Ok(f) => f,
        Err(e) => {
            println!("no such file {}: {e}", params.file);
            return;
        }
    };
    let stream = ReaderStream::new(f);
    let stream = reqwest::Body::wrap_stream(stream);

    let client = Client::new();
    let result = client.post(resource.to_string()).body(stream).send().await;
    match result {
        Ok(x) if x.status().is_success() => match x.json::<UploadResult>().await {
            Ok(r) => {
                println!(
                    "file {} inserted. id: {} chunks: {} new: {} deduplicated: {}",
                    params.file, r.file_id, r.total_chunks, r.unique_chunks, r.duplicate_chunks
                );
            }
            Err(e) => println!("JSON decode error: {e}"),
        },
        Ok(x) => {
            println!("file {} not inserted. Status: {}", params.file, x.status());
        }
        Err(e) => {
            println!("insert_file error: {e}");
        }
    }
}

pub async fn list_buckets(uri: &str) {
    let Some(mut resource) = Resource::new(uri) else {
        println!("invalid uri: {uri}");
        return;
    };
    resource.append_path("api/");

    let client = Client::new();

    match client.get(resource.to_string()).send().await {
        Ok(response) => match response.json().await {
            Ok(r) => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_HORIZONTAL_ONLY)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_width(120)
                    .set_header(vec![
                        Cell::new("Bucket").add_attribute(Attribute::Bold),
                        Cell::new("Files count").add_attribute(Attribute::Bold),
                    ]);

                let buckets: Vec<Bucket> = r;
                for b in buckets {
                    table.add_row(vec![Cell::new(b.id), Cell::new(b.files_count)]);
                }
                println!("{table}");
            }
            Err(e) => println!("JSON decode error: {e}"),
        },
        Err(e) => {
            println!("error: {e}");
        }
    }
}

pub async fn list_files(uri: &str, bucket: &str) {
    let Some(mut resource) = Resource::new(uri) else {
        println!("invalid uri: {uri}");
        return;
    };
    resource.append_path("api").append_path(bucket);

    let client = Client::new();

    match client.get(resource.to_string()).send().await {
        Ok(response) => match response.json().await {
            Ok(r) => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_HORIZONTAL_ONLY)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_width(120)
                    .set_header(vec![
                        Cell::new("Id").add_attribute(Attribute::Bold),
                        Cell::new("Path").add_attribute(Attribute::Bold),
                        Cell::new("Size").add_attribute(Attribute::Bold),
                        Cell::new("Chunks").add_attribute(Attribute::Bold),
                        Cell::new("Uploaded").add_attribute(Attribute::Bold),
                    ]);

                let files: Vec<File> = r;
                for f in files {
                    table.add_row(vec![
                        Cell::new(f.id),
                        Cell::new(f.path),
                        Cell::new(f.size),
                        Cell::new(f.chunk_count),
                        Cell::new(f.uploaded_at),
                    ]);
                }
                println!("{table}");
            }
            Err(e) => println!("JSON decode error: {e}"),
        },
        Err(e) => {
            println!("error: {e}");
        }
    }
}

pub async fn get_file(uri: &str, id: i64, output: &str) {
    let Some(mut resource) = Resource::new(uri) else {
        println!("invalid uri: {uri}");
        return;
    };
    resource.append_path("api/file").append_path(&id.to_string());

    let client = Client::new();
    match client.get(resource.to_string()).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(content) => match tokio::fs::write(output, &content).await {
                Ok(()) => println!("file {id} saved to {output} ({} bytes)", content.len()),
                Err(e) => println!("cannot write {output}: {e}"),
            },
            Err(e) => println!("download error: {e}"),
        },
        Ok(response) => {
            println!("file {id} not downloaded. Status: {}", response.status());
        }
        Err(e) => {
            println!("error: {e}");
        }
    }
}

pub async fn file_meta(uri: &str, id: i64) {
    let Some(mut resource) = Resource::new(uri) else {
        println!("invalid uri: {uri}");
        return;
    };
    resource
        .append_path("api/file")
        .append_path(&id.to_string())
        .append_path("meta");

    let client = Client::new();
    match client.get(resource.to_string()).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<File>().await {
                Ok(meta) => match serde_json::to_string_pretty(&meta) {
                    Ok(json) => println!("{json}"),
                    Err(e) => println!("JSON encode error: {e}"),
                },
                Err(e) => println!("JSON decode error: {e}"),
            }
        }
        Ok(response) => {
            println!("file {id} not found. Status: {}", response.status());
        }
        Err(e) => {
            println!("error: {e}");
        }
    }
}

pub async fn delete_file(uri: &str, id: i64) {
    let Some(mut resource) = Resource::new(uri) else {
        println!("invalid uri: {uri}");
        return;
    };
    resource.append_path("api/file").append_path(&id.to_string());

    let client = Client::new();
    match client.delete(resource.to_string()).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<DeleteResult>().await {
                Ok(r) => println!("file {id} deleted, blobs reclaimed: {}", r.blobs),
                Err(e) => println!("JSON decode error: {e}"),
            }
        }
        Ok(response) => {
            println!("file {id} not deleted. Status: {}", response.status());
        }
        Err(e) => {
            println!("error: {e}");
        }
    }
}
