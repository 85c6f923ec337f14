use crate::prelude::*;
use serde::{Deserialize, Serialize};

/// Sidecar written next to every successfully rendered map.
pub const SIDECAR: &str = "mapinfo.json";
/// Title of a map whose world is gone and whose sidecar never named it.
pub const ORPHAN_NAME: &str = "Unknown - not in Minecraft worlds";

/// How much the renderer draws. The flag form is what gets passed on the
/// renderer's command line and what the sidecar stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    Overview,
    OverviewPlusBiomes,
    #[default]
    AllDetails,
}
impl DetailLevel {
    pub const ALL: [Self; 3] = [Self::Overview, Self::OverviewPlusBiomes, Self::AllDetails];

    pub fn flag(self) -> &'static str {
        match self {
            Self::Overview => "--html",
            Self::OverviewPlusBiomes => "--html-most",
            Self::AllDetails => "--html-all",
        }
    }
    pub fn from_flag(flag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.flag() == flag)
    }
    pub fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overviews only",
            Self::OverviewPlusBiomes => "Overviews+Biomes",
            Self::AllDetails => "ALL details",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    pub display_name: String,
    pub detail: DetailLevel,
    pub public: bool,
}
impl Default for MapInfo {
    fn default() -> Self {
        Self {
            display_name: ORPHAN_NAME.to_owned(),
            detail: DetailLevel::AllDetails,
            public: true,
        }
    }
}

// Every key may be missing from a file on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    #[serde(default)]
    worldname: Option<String>,
    #[serde(default)]
    mapdetail: Option<String>,
    #[serde(default)]
    publicmap: Option<bool>,
}
impl Sidecar {
    fn into_info(self, id: &str) -> MapInfo {
        let defaults = MapInfo::default();
        let detail = match self.mapdetail.as_deref().map(|f| (f, DetailLevel::from_flag(f))) {
            None => defaults.detail,
            Some((_, Some(detail))) => detail,
            Some((flag, None)) => {
                log::warn!("map {id} has unknown detail level {flag:?}");
                defaults.detail
            }
        };
        MapInfo {
            display_name: self.worldname.unwrap_or(defaults.display_name),
            detail,
            public: self.publicmap.unwrap_or(defaults.public),
        }
    }
}

/// Reads and writes the per-map sidecar. This is the only state the server
/// itself persists; everything else is rediscovered from the directory trees.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    maps_root: PathBuf,
}

impl MetadataStore {
    pub fn new(maps_root: impl Into<PathBuf>) -> Self {
        Self { maps_root: maps_root.into() }
    }
    pub fn path(&self, id: &str) -> PathBuf {
        self.maps_root.join(id).join(SIDECAR)
    }

    /// `None` when the map has no sidecar, or one that cannot be read.
    pub fn load(&self, id: &str) -> Option<MapInfo> {
        let path = self.path(id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("unable to read {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_slice::<Sidecar>(&raw) {
            Ok(sidecar) => Some(sidecar.into_info(id)),
            Err(e) => {
                log::warn!("ignoring malformed {}: {e}", path.display());
                None
            }
        }
    }

    /// Overwrites the sidecar. Failure is logged and swallowed: the map
    /// itself is already on disk and stays usable with default metadata.
    pub fn save(&self, id: &str, info: &MapInfo) {
        let path = self.path(id);
        log::info!("writing {}", path.display());
        if let Err(e) = self.write(&path, info) {
            log::error!("unable to write {}: {e}", path.display());
        }
    }
    fn write(&self, path: &Path, info: &MapInfo) -> io::Result<()> {
        let sidecar = Sidecar {
            worldname: Some(info.display_name.clone()),
            mapdetail: Some(info.detail.flag().to_owned()),
            publicmap: Some(info.public),
        };
        let json = serde_json::to_vec(&sidecar)?;
        // readers never observe a half-written file
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            e
        })
    }
}
