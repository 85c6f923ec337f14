mod collections;
pub mod types;
pub mod error;
pub mod config;
pub mod metadata;
pub mod scan;
pub mod catalog;
pub mod access;
pub mod render;
pub mod page;
pub mod frontend;
pub mod network;

pub use catalog::Catalog;
pub use config::Config;
pub use error::Error;
pub use frontend::Frontend;
pub use network::Network;

mod prelude {
    pub(crate) use crate::collections::*;
    pub(crate) use crate::types::*;
    pub(crate) use std::{fs, io, time};
    pub(crate) use std::path::{Path, PathBuf};
}
