//! The merged view of worlds and maps.
//!
//! Worlds and maps live in two directory trees that change independently of
//! each other: the game adds and removes worlds, the server adds and removes
//! maps. A [`Catalog`] folds scans of both trees into one list of
//! [`WorldEntity`], newest first, that the listing page is drawn from.
//!
//! The catalog is folded forward rather than rebuilt from nothing. It is
//! seeded from the worlds once, and every listing folds the current map scan
//! into what is already known. A world keeps its place in the list even after
//! a map for it was deleted, and a map keeps its place after its world was
//! deleted.
use crate::metadata::{DetailLevel, MapInfo};
use crate::scan::{MapRecord, WorldRecord};
use std::collections::HashSet;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldEntity {
    pub id: String,
    pub display_name: String,
    /// `None` once the world is gone from the game's directory.
    pub source_modified_at: Option<SystemTime>,
    pub sort_key: u64,
    pub map_modified_at: Option<SystemTime>,
    pub has_rendered_map: bool,
    /// Whether the world still exists, and so can be rendered again.
    pub is_source_world_present: bool,
    pub render_detail_level: DetailLevel,
    /// Only meaningful while `has_rendered_map` holds.
    pub is_public: bool,
}

impl WorldEntity {
    fn from_world(world: WorldRecord) -> Self {
        Self {
            id: world.id,
            display_name: world.display_name,
            source_modified_at: Some(world.modified_at),
            sort_key: world.sort_key,
            map_modified_at: None,
            has_rendered_map: false,
            is_source_world_present: true,
            render_detail_level: DetailLevel::default(),
            is_public: true,
        }
    }
    fn from_orphan(map: &MapRecord, has_rendered_map: bool) -> Self {
        let MapInfo { display_name, detail, public } = map.info.clone();
        Self {
            id: map.id.clone(),
            display_name,
            source_modified_at: None,
            sort_key: map.sort_key,
            map_modified_at: Some(map.index_modified_at),
            has_rendered_map,
            is_source_world_present: false,
            render_detail_level: detail,
            is_public: public,
        }
    }
    fn is_stale(&self) -> bool {
        !self.has_rendered_map && !self.is_source_world_present
    }
}

/// Owned, single-writer table of every entity worth listing.
///
/// Nothing here synchronises: the server only ever touches the catalog from
/// its event loop, so every read-modify-write runs to completion before the
/// next request is looked at.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    entities: Vec<WorldEntity>,
}

impl Catalog {
    pub fn seed(worlds: Vec<WorldRecord>) -> Self {
        let entities = worlds.into_iter().map(WorldEntity::from_world).collect();
        let mut catalog = Self { entities };
        catalog.sort();
        catalog
    }

    /// Forgets everything learned so far and starts again from a fresh world
    /// scan. An empty scan is assumed to be a hiccup and changes nothing.
    pub fn refresh(&mut self, worlds: Vec<WorldRecord>) {
        if worlds.is_empty() {
            log::warn!("world scan came back empty, keeping the previous list");
            return;
        }
        *self = Self::seed(worlds);
    }

    pub fn entities(&self) -> &[WorldEntity] {
        &self.entities
    }
    pub fn get(&self, id: &str) -> Option<&WorldEntity> {
        self.position(id).map(|i| &self.entities[i])
    }
    fn position(&self, id: &str) -> Option<usize> {
        self.entities.iter().position(|e| e.id == id)
    }
    // stable, so equal keys keep the order they were scanned in
    fn sort(&mut self) {
        self.entities.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
    }

    /// Flips the visibility of a rendered map. Returns the updated entity so
    /// the caller can persist it, or `None` when there is no map to flip.
    pub fn set_public(&mut self, id: &str, public: bool) -> Option<&WorldEntity> {
        let entity = self.entities.iter_mut().find(|e| e.id == id && e.has_rendered_map)?;
        entity.is_public = public;
        Some(entity)
    }

    /// Folds a map scan into the list.
    ///
    /// `exclude` names a map that has just been deleted. Its directory may
    /// still show up in `maps` while the removal finishes, so it is treated as
    /// having no map regardless of what the scan says.
    ///
    /// Returns the number of maps that count as rendered.
    pub fn reconcile(&mut self, maps: &[MapRecord], exclude: Option<&str>) -> usize {
        let scanned: HashSet<&str> = maps.iter().map(|m| m.id.as_str()).collect();
        for entity in &mut self.entities {
            if entity.has_rendered_map && !scanned.contains(entity.id.as_str()) {
                log::debug!("map for {} is gone", entity.id);
                entity.has_rendered_map = false;
                entity.map_modified_at = None;
            }
        }

        let mut rendered = 0;
        let mut appended = false;
        for map in maps {
            let has_rendered_map = exclude != Some(map.id.as_str());
            rendered += has_rendered_map as usize;
            let Some(i) = self.position(&map.id) else {
                // the world this map was drawn from has been deleted
                self.entities.push(WorldEntity::from_orphan(map, has_rendered_map));
                appended = true;
                continue;
            };
            let entity = &mut self.entities[i];
            entity.has_rendered_map = has_rendered_map;
            entity.render_detail_level = map.info.detail;
            entity.map_modified_at = has_rendered_map.then_some(map.index_modified_at);
            if has_rendered_map {
                entity.is_public = map.info.public;
            }
            if !entity.is_source_world_present {
                entity.display_name.clone_from(&map.info.display_name);
            }
        }
        if appended {
            self.sort();
        }

        self.entities.retain(|e| {
            if e.is_stale() {
                log::debug!("dropping {}, it has neither world nor map", e.id);
            }
            !e.is_stale()
        });
        log::info!("found {rendered} maps");
        rendered
    }
}
