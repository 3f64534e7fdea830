use axum::{
    body::Body,
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use kernel::File;
use utoipa::{
    openapi::{self, content, schema::Type, ObjectBuilder, RefOr, ResponseBuilder},
    ToResponse,
};

/// Binary file download reply carrying the reassembled content and the
/// metadata used for the content headers.
pub struct FileReply {
    data: Vec<u8>,
    file: File,
}

impl FileReply {
    #[must_use]
    pub fn new(data: Vec<u8>, file: File) -> Self {
        Self { data, file }
    }

    fn name_from_path(&self) -> &str {
        let path = &self.file.path;
        if let Some(ix) = path.rfind(['\\', '/']) {
            &path[ix + 1..]
        } else {
            path
        }
    }
}

impl IntoResponse for FileReply {
    fn into_response(self) -> Response {
        let file_name = self.name_from_path().to_owned();
        let content_type = HeaderValue::from_str(&self.file.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        let len = self.file.size.to_string();
        let mut res = Body::from(self.data).into_response();
        res.headers_mut().insert("content-type", content_type);
        let attachment = format!(r#"attachment; filename="{file_name}""#);
        if let Ok(val) = HeaderValue::from_str(attachment.as_str()) {
            res.headers_mut().insert("content-disposition", val);
        }
        if let Ok(val) = HeaderValue::from_str(len.as_str()) {
            res.headers_mut().insert("Content-Length", val);
        }

        res
    }
}

impl ToResponse<'static> for FileReply {
    fn response() -> (&'static str, RefOr<openapi::Response>) {
        let object = ObjectBuilder::new()
            .schema_type(Type::String)
            .format(Some(openapi::SchemaFormat::KnownFormat(
                openapi::KnownFormat::Binary,
            )))
            .build();
        let content = content::Content::new(Some(object));
        (
            "FileReply",
            ResponseBuilder::new()
                .description("File binary content")
                .content("application/octet-stream", content)
                .build()
                .into(),
        )
    }
}
