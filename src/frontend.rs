//! What the server does in answer to a viewer.
//!
//! Every action ends the same way: the maps are scanned again, folded into
//! the catalog, filtered for whoever asked and drawn as a page. Creating a
//! map is the only action that cannot answer straight away; its page is
//! produced once the render has finished, by [`Frontend::finish_renders`].
use crate::prelude::*;
use crate::access::{self, Viewer};
use crate::catalog::Catalog;
use crate::metadata::{DetailLevel, MapInfo, MetadataStore};
use crate::render::{RenderJob, RenderQueue, Renderer, Waker};
use crate::{page, scan, Config, Error};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    List,
    NewMap { world: String, detail: DetailLevel, display_name: String, public: bool },
    Delete { map: String },
    ToggleVisibility { map: String, public: bool },
    Refresh,
}

impl Action {
    /// Decodes the fields of a posted list form, along with the scroll
    /// position to restore. Anything unrecognised just lists.
    pub fn from_form<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> (Self, u32) {
        let mut op = "";
        let (mut map, mut detail, mut name, mut public, mut scroll) = ("", "", None, true, 0);
        for (key, value) in fields {
            match key {
                "op" => op = value,
                "mapname" => map = value,
                "mapdetail" => detail = value,
                "worldname" => name = Some(value),
                "publicmap" => public = value != "false",
                "scrollpos" => {
                    scroll = value.trim().parse::<f64>().map_or(0, |s| s.max(0.0) as u32)
                }
                _ => {}
            }
        }
        let action = match op {
            "newmap" => Action::NewMap {
                world: map.to_owned(),
                detail: DetailLevel::from_flag(detail).unwrap_or_default(),
                display_name: name.unwrap_or(scan::UNKNOWN_WORLD).to_owned(),
                public,
            },
            "delete" => Action::Delete { map: map.to_owned() },
            "html_buttonPublicToggle" => Action::ToggleVisibility { map: map.to_owned(), public },
            "refresh" => Action::Refresh,
            _ => Action::List,
        };
        (action, scroll)
    }
}

/// Who is waiting for a render, and how to draw their page once it is done.
#[derive(Debug)]
struct Waiting<T> {
    tag: T,
    viewer: Viewer,
    scroll: u32,
}

pub struct Frontend<T> {
    config: Config,
    store: MetadataStore,
    catalog: Catalog,
    renders: RenderQueue<Waiting<T>>,
    rendering: HashSet<MapId>,
}

impl<T: Send + 'static> Frontend<T> {
    /// Seeds the catalog from the worlds. Not being able to list the worlds
    /// here means the server is misconfigured.
    pub fn start(config: Config, renderer: Arc<dyn Renderer>) -> Result<Self, Error> {
        let worlds =
            scan::scan_worlds(&config.worlds_root).map_err(|source| Error::WorldsUnreadable {
                path: config.worlds_root.clone(),
                source,
            })?;
        let store = MetadataStore::new(&config.maps_root);
        let mut catalog = Catalog::seed(worlds);
        catalog.reconcile(&scan::scan_maps(&config.maps_root, &store), None);
        Ok(Self {
            store,
            catalog,
            renders: RenderQueue::new(renderer),
            rendering: HashSet::new(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
    pub fn set_waker(&mut self, waker: Waker) {
        self.renders.set_waker(waker);
    }
    pub fn authorize(&self, client: Option<std::net::IpAddr>, cookie: Option<&str>) -> Viewer {
        access::authorize(client, cookie, self.config.management_key.as_deref())
    }

    /// Whether files of the map `id` may be served to `viewer`. The disk is
    /// asked rather than the catalog, so a map can be viewed before anyone
    /// has loaded the list.
    pub fn may_serve(&self, viewer: Viewer, id: &str) -> bool {
        if viewer.may_mutate() {
            return true;
        }
        let Some(id) = MapId::parse(id) else {
            return false;
        };
        let rendered = self.config.maps_root.join(&id).join(scan::INDEX).is_file();
        rendered && self.store.load(id.as_str()).map_or(true, |info| info.public)
    }

    /// Re-derives the list and draws it for `viewer`.
    pub fn list(&mut self, viewer: Viewer, exclude: Option<&MapId>, scroll: u32) -> String {
        log::debug!("making html map list");
        let maps = scan::scan_maps(&self.config.maps_root, &self.store);
        self.catalog.reconcile(&maps, exclude.map(MapId::as_str));
        page::render(&access::filter(self.catalog.entities(), viewer), viewer, scroll)
    }

    /// Carries out `action`. Returns the page to answer with, or `None` when
    /// a render was started and the answer comes from
    /// [`finish_renders`](Self::finish_renders) with `tag` attached.
    pub fn perform(
        &mut self,
        viewer: Viewer,
        action: Action,
        scroll: u32,
        tag: T,
    ) -> Option<String> {
        if !viewer.may_mutate() && action != Action::List {
            log::warn!("ignoring {action:?} from a public viewer");
            return Some(self.list(viewer, None, scroll));
        }
        let exclude = match action {
            Action::List => None,
            Action::Refresh => {
                self.refresh();
                None
            }
            Action::Delete { map } => self.delete(&map),
            Action::ToggleVisibility { map, public } => {
                self.toggle_visibility(&map, public);
                None
            }
            Action::NewMap { world, detail, display_name, public } => {
                if let Some(job) = self.start_render(&world, detail, display_name, public) {
                    let id = job.map_id.clone();
                    match self.renders.submit(job, Waiting { tag, viewer, scroll }) {
                        Ok(()) => return None,
                        Err(e) => {
                            log::error!("unable to start render of {id}: {e}");
                            self.rendering.remove(&id);
                        }
                    }
                }
                None
            }
        };
        Some(self.list(viewer, exclude.as_ref(), scroll))
    }

    /// Applies every render that has finished and returns the pages owed to
    /// whoever started them.
    pub fn finish_renders(&mut self) -> Vec<(T, String)> {
        let finished: Vec<_> = self.renders.completed().collect();
        finished
            .into_iter()
            .map(|done| {
                let job = done.job;
                self.rendering.remove(&job.map_id);
                if done.outcome.success {
                    log::info!("created map {}", job.map_id);
                    let info = MapInfo {
                        display_name: job.display_name,
                        detail: job.detail,
                        public: job.public,
                    };
                    self.store.save(job.map_id.as_str(), &info);
                } else {
                    let status = done.outcome.exit_status;
                    log::warn!("render of {} failed with exit status {status:?}", job.map_id);
                }
                let waiting = done.tag;
                let html = self.list(waiting.viewer, None, waiting.scroll);
                (waiting.tag, html)
            })
            .collect()
    }

    /// Number of renders still running.
    pub fn renders_in_progress(&self) -> usize {
        self.rendering.len()
    }

    fn refresh(&mut self) {
        match scan::scan_worlds(&self.config.worlds_root) {
            Ok(worlds) => self.catalog.refresh(worlds),
            Err(e) => log::error!("unable to rescan {}: {e}", self.config.worlds_root.display()),
        }
    }

    // Returns the map to leave out of the next listing.
    fn delete(&mut self, raw: &str) -> Option<MapId> {
        let Some(id) = MapId::parse(raw) else {
            log::warn!("refusing to delete map with unexpected name {raw:?}");
            return None;
        };
        if self.rendering.contains(&id) {
            log::warn!("not deleting {id} while it is being rendered");
            return None;
        }
        let dir = self.config.maps_root.join(&id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => log::info!("deleted {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} already gone", dir.display())
            }
            Err(e) => log::error!("unable to delete {}: {e}", dir.display()),
        }
        Some(id)
    }

    fn toggle_visibility(&mut self, raw: &str, public: bool) {
        let Some(entity) = self.catalog.set_public(raw, public) else {
            log::warn!("no map {raw:?} to make {}", if public { "public" } else { "private" });
            return;
        };
        let info = MapInfo {
            display_name: entity.display_name.clone(),
            detail: entity.render_detail_level,
            public: entity.is_public,
        };
        let id = entity.id.clone();
        self.store.save(&id, &info);
    }

    fn start_render(
        &mut self,
        raw: &str,
        detail: DetailLevel,
        display_name: String,
        public: bool,
    ) -> Option<RenderJob> {
        let Some(map_id) = MapId::parse(raw) else {
            log::warn!("refusing to render world with unexpected name {raw:?}");
            return None;
        };
        if !self.catalog.get(raw).map_or(false, |e| e.is_source_world_present) {
            log::warn!("no world {map_id} to render");
            return None;
        }
        if !self.rendering.insert(map_id.clone()) {
            log::warn!("{map_id} is already being rendered");
            return None;
        }
        log::info!("rendering {map_id} with {}", detail.flag());
        Some(RenderJob {
            source: self.config.worlds_root.join(&map_id),
            output: self.config.maps_root.join(&map_id),
            map_id,
            display_name,
            detail,
            public,
        })
    }
}

impl<T> std::fmt::Debug for Frontend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frontend")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("rendering", &self.rendering)
            .finish()
    }
}
