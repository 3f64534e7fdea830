use client::FileParams;

pub async fn insert_single_file(params: FileParams) {
    client::insert_file(params).await;
}

pub async fn list_buckets(uri: &str) {
    client::list_buckets(uri).await;
}

pub async fn list_files(uri: &str, bucket: &str) {
    client::list_files(uri, bucket).await;
}

pub async fn get_file(uri: &str, id: i64, output: &str) {
    client::get_file(uri, id, output).await;
}

pub async fn file_meta(uri: &str, id: i64) {
    client::file_meta(uri, id).await;
}

pub async fn delete_file(uri: &str, id: i64) {
    client::delete_file(uri, id).await;
}
