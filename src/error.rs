use std::io;
use std::path::PathBuf;

/// Conditions that keep the server from starting or from continuing to serve.
/// Everything that goes wrong while handling a single request is logged and
/// degraded instead, and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to read worlds directory {}: {source}", .path.display())]
    WorldsUnreadable { path: PathBuf, source: io::Error },
    #[error("unable to create maps directory {}: {source}", .path.display())]
    MapsUncreatable { path: PathBuf, source: io::Error },
    #[error("invalid {name} setting {value:?}")]
    InvalidSetting { name: &'static str, value: String },
    #[error("unable to listen on port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("event loop failed: {0}")]
    EventLoop(#[from] io::Error),
}
