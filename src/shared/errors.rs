#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to create state path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve home directory for state root")]
    HomeDirectoryUnavailable,
}
