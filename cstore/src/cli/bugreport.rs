use bugreport::{
    bugreport,
    collector::{CompileTimeInformation, EnvironmentVariables, OperatingSystem, SoftwareVersion},
    format::Markdown,
};

pub fn run() {
    bugreport!()
        .info(SoftwareVersion::default())
        .info(OperatingSystem::default())
        .info(EnvironmentVariables::list(&[
            "SHELL",
            "TERM",
            "RUST_LOG",
            "CSTORE_DATA_FILE",
            "CSTORE_DATA_DIR",
            "CSTORE_BLOB_DIR",
            "CSTORE_PORT",
            "CSTORE_CHUNK_SIZE",
        ]))
        .info(CompileTimeInformation::default())
        .print::<Markdown>();
}
