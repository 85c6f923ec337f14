use crate::prelude::*;
use crate::Error;

pub const DEFAULT_WORLDS_PATH: &str = "/tmp/worlds";
pub const DEFAULT_MAPS_PATH: &str = "/tmp/maps";
pub const DEFAULT_PORT: u16 = 3333;
pub const DEFAULT_RENDERER: &str = "bedrock-viz";

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the game keeps its worlds. Only ever read.
    pub worlds_root: PathBuf,
    /// Where rendered maps are written and served from.
    pub maps_root: PathBuf,
    /// Cookie value that grants management rights to remote viewers.
    pub management_key: Option<String>,
    pub port: u16,
    pub renderer: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let port = match set("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| Error::InvalidSetting { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };
        let path = |name: &str, default: &str| {
            PathBuf::from(set(name).as_deref().unwrap_or(default))
        };
        Ok(Self {
            worlds_root: path("WORLDS_PATH", DEFAULT_WORLDS_PATH),
            maps_root: path("MAPS_PATH", DEFAULT_MAPS_PATH),
            management_key: set("MANAGEMENT_KEY"),
            port,
            renderer: path("BEDROCK_VIZ", DEFAULT_RENDERER),
        })
    }

    /// Checks the directories before anything is served. The worlds root must
    /// be listable and the maps root must exist, creating it if needed.
    pub fn prepare(&self) -> Result<(), Error> {
        fs::read_dir(&self.worlds_root).map_err(|source| Error::WorldsUnreadable {
            path: self.worlds_root.clone(),
            source,
        })?;
        if !self.maps_root.is_dir() {
            fs::create_dir_all(&self.maps_root).map_err(|source| Error::MapsUncreatable {
                path: self.maps_root.clone(),
                source,
            })?;
            log::info!("created maps directory {}", self.maps_root.display());
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        (std::net::Ipv4Addr::UNSPECIFIED, self.port).into()
    }
}
