//! Discovery of the two directory trees the listing is derived from: the
//! game's worlds, and the maps rendered from them.
use crate::prelude::*;
use crate::metadata::{MapInfo, MetadataStore};
use std::time::{SystemTime, UNIX_EPOCH};

/// Optional file inside a world directory holding its in-game title.
pub const LEVEL_NAME: &str = "levelname.txt";
/// Entry point written by the renderer as its very last step.
pub const INDEX: &str = "index.html";
/// Title of a world with no readable `levelname.txt`.
pub const UNKNOWN_WORLD: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldRecord {
    pub id: String,
    pub display_name: String,
    pub modified_at: SystemTime,
    pub sort_key: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRecord {
    pub id: String,
    pub index_modified_at: SystemTime,
    pub sort_key: u64,
    pub info: MapInfo,
}

// Subdirectories of `root` in name order, so equal timestamps always come out
// the same way round.
fn subdirectories(root: &Path) -> io::Result<Vec<(String, PathBuf, fs::Metadata)>> {
    let mut dirs = vec![];
    for entry in fs::read_dir(root)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("unable to list an entry of {}: {e}", root.display());
                continue;
            }
        };
        let path = entry.path();
        // follows links, a world may well be symlinked in
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("unable to get information on {}: {e}", path.display());
                continue;
            }
        };
        if !meta.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => dirs.push((name, path, meta)),
            Err(name) => log::warn!("skipping {name:?}, not valid unicode"),
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

fn modified(meta: &fs::Metadata) -> SystemTime {
    meta.modified().unwrap_or(UNIX_EPOCH)
}

/// Lists the worlds, newest first. Failing to list the root at all is the
/// caller's problem; a single unreadable world is not.
pub fn scan_worlds(root: &Path) -> io::Result<Vec<WorldRecord>> {
    log::debug!("getting Minecraft worlds information");
    let mut worlds: Vec<WorldRecord> = subdirectories(root)?
        .into_iter()
        .map(|(id, path, meta)| {
            let display_name = match fs::read_to_string(path.join(LEVEL_NAME)) {
                Ok(name) if !name.trim().is_empty() => name.trim_end().to_owned(),
                Ok(_) => UNKNOWN_WORLD.to_owned(),
                Err(e) => {
                    log::debug!("no level name for world {id}: {e}");
                    UNKNOWN_WORLD.to_owned()
                }
            };
            let modified_at = modified(&meta);
            WorldRecord { id, display_name, modified_at, sort_key: millis(modified_at) }
        })
        .collect();
    worlds.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
    log::info!(
        "found worlds: {}",
        worlds.iter().map(|w| w.id.as_str()).collect::<Vec<_>>().join(",")
    );
    Ok(worlds)
}

/// Lists the maps whose render has completed. A map directory without its
/// index is still being written, or was abandoned by a failed render.
pub fn scan_maps(root: &Path, store: &MetadataStore) -> Vec<MapRecord> {
    let dirs = match subdirectories(root) {
        Ok(dirs) => dirs,
        Err(e) => {
            log::error!("unable to list maps in {}: {e}", root.display());
            return vec![];
        }
    };
    let maps: Vec<MapRecord> = dirs
        .into_iter()
        .filter_map(|(id, path, _)| {
            let index = path.join(INDEX);
            let meta = match fs::metadata(&index) {
                Ok(meta) => meta,
                Err(e) => {
                    log::debug!("no completed map in {}: {e}", path.display());
                    return None;
                }
            };
            let index_modified_at = modified(&meta);
            let info = store.load(&id).unwrap_or_default();
            Some(MapRecord { id, index_modified_at, sort_key: millis(index_modified_at), info })
        })
        .collect();
    log::debug!("found {} maps", maps.len());
    maps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DetailLevel, ORPHAN_NAME};
    use std::time::Duration;

    fn touch(path: &Path, secs: u64) {
        let file = fs::File::options()
            .write(true)
            .open(path)
            .or_else(|_| fs::File::open(path))
            .unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    fn world(root: &Path, id: &str, name: Option<&str>, secs: u64) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        if let Some(name) = name {
            fs::write(dir.join(LEVEL_NAME), name).unwrap();
        }
        touch(&dir, secs);
    }

    #[test]
    fn worlds_newest_first_with_fallback_name() {
        let tmp = tempfile::tempdir().unwrap();
        world(tmp.path(), "old", Some("Old Survival\n"), 100);
        world(tmp.path(), "new", Some("Creative"), 300);
        world(tmp.path(), "nameless", None, 200);
        fs::write(tmp.path().join("stray.txt"), "not a world").unwrap();

        let worlds = scan_worlds(tmp.path()).unwrap();
        let ids: Vec<_> = worlds.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["new", "nameless", "old"]);
        assert_eq!(worlds[0].display_name, "Creative");
        assert_eq!(worlds[1].display_name, UNKNOWN_WORLD);
        assert_eq!(worlds[2].display_name, "Old Survival");
        assert_eq!(worlds[0].sort_key, 300_000);
    }

    #[test]
    fn equal_timestamps_keep_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        for id in ["c", "a", "b"] {
            world(tmp.path(), id, None, 50);
        }
        let ids: Vec<_> = scan_worlds(tmp.path()).unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn unlistable_worlds_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan_worlds(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn maps_need_their_index() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(tmp.path());
        fs::create_dir(tmp.path().join("rendering")).unwrap();
        fs::create_dir(tmp.path().join("done")).unwrap();
        fs::write(tmp.path().join("done").join(INDEX), "<html>").unwrap();
        touch(&tmp.path().join("done").join(INDEX), 42);

        let maps = scan_maps(tmp.path(), &store);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].id, "done");
        assert_eq!(maps[0].sort_key, 42_000);
        assert_eq!(maps[0].info.display_name, ORPHAN_NAME);
        assert_eq!(maps[0].info.detail, DetailLevel::AllDetails);
        assert!(maps[0].info.public);
    }

    #[test]
    fn maps_carry_their_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(tmp.path());
        let dir = tmp.path().join("m1");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(INDEX), "<html>").unwrap();
        let info = MapInfo {
            display_name: "Island".into(),
            detail: DetailLevel::Overview,
            public: false,
        };
        store.save("m1", &info);

        let maps = scan_maps(tmp.path(), &store);
        assert_eq!(maps[0].info, info);
    }

    #[test]
    fn unlistable_maps_root_scans_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("missing");
        assert!(scan_maps(&root, &MetadataStore::new(&root)).is_empty());
    }
}
