pub mod bugreport;
pub mod client;
pub mod server;
pub mod version;

pub const SERVER_SUBCOMMAND: &str = "server";
pub const SERVER_DESCRIPTION: &str = "Run the server";

pub const VERSION_SUBCOMMAND: &str = "version";
pub const VERSION_DESCRIPTION: &str = "Display the version and build information";

pub const BUGREPORT_SUBCOMMAND: &str = "bugreport";
pub const BUGREPORT_DESCRIPTION: &str = "Collect information about the environment for a bug report";

pub const INSERT_SUBCOMMAND: &str = "insert";
pub const INSERT_DESCRIPTION: &str = "Insert file(s) into store";

pub const FILE_SUBCOMMAND: &str = "file";
pub const INSERT_FILE_DESCRIPTION: &str = "Insert single file into store";

pub const LIST_SUBCOMMAND: &str = "list";
pub const LIST_DESCRIPTION: &str = "List store contents";

pub const BUCKET_SUBCOMMAND: &str = "bucket";
pub const BUCKET_LIST_DESCRIPTION: &str = "List all buckets";

pub const FILES_SUBCOMMAND: &str = "files";
pub const FILES_LIST_DESCRIPTION: &str = "List all files of a bucket";

pub const GET_SUBCOMMAND: &str = "get";
pub const GET_DESCRIPTION: &str = "Download a file by its id";

pub const META_SUBCOMMAND: &str = "meta";
pub const META_DESCRIPTION: &str = "Show file metadata by its id";

pub const RM_SUBCOMMAND: &str = "rm";
pub const RM_DESCRIPTION: &str = "Delete a file by its id";
