/// Archive component layout
///
/// Archives carry no version marker. Which components an extracted tree holds,
/// and where, is found by probing known names of each historical layout
/// independently per component.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::catalog::{ArchiveName, Strategy};
use crate::utils::{
    DUMP_FILE, LEGACY_CONFIG, LEGACY_DATA, LEGACY_DB_DIR, MODERN_APPS, MODERN_AUTOMATION,
    MODERN_CONFIG, MODERN_DATA, MODERN_DB_DIR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    Data,
    Database,
    Config,
    Apps,
    Automation,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Data,
        Component::Database,
        Component::Config,
        Component::Apps,
        Component::Automation,
    ];

    /// Location written by capture (modern layout)
    pub fn staging_path(&self, root: &Path) -> PathBuf {
        match self {
            Component::Data => root.join(MODERN_DATA),
            Component::Database => root.join(MODERN_DB_DIR).join(DUMP_FILE),
            Component::Config => root.join(MODERN_CONFIG),
            Component::Apps => root.join(MODERN_APPS),
            Component::Automation => root.join(MODERN_AUTOMATION),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Component::Data => "data",
            Component::Database => "database-dump",
            Component::Config => "config",
            Component::Apps => "auxiliary-apps",
            Component::Automation => "automation-config",
        };
        f.write_str(s)
    }
}

/// Historical archive layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `data/`, `db/nextcloud.sql`, `config/`
    Legacy,
    /// `nc_data/`, `nc_db/`, `nc_config/`, `nc_apps/`, `ha_config/`
    Modern,
    /// Data files directly at the archive root (historical data-only archives)
    Bare,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub layout: Layout,
    pub path: PathBuf,
}

/// Presence map of the components found in an extracted tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentPresence {
    found: BTreeMap<Component, Located>,
}

impl ComponentPresence {
    pub fn get(&self, component: Component) -> Option<&Located> {
        self.found.get(&component)
    }

    pub fn has(&self, component: Component) -> bool {
        self.found.contains_key(&component)
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub fn components(&self) -> Vec<Component> {
        self.found.keys().copied().collect()
    }

    fn insert(&mut self, component: Component, layout: Layout, path: PathBuf) {
        self.found.insert(component, Located { layout, path });
    }
}

/// First `.sql` file in `dir`, preferring the canonical dump name
fn find_dump(dir: &Path) -> Option<PathBuf> {
    let canonical = dir.join(DUMP_FILE);
    if canonical.is_file() {
        return Some(canonical);
    }

    let mut dumps: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    dumps.sort();
    dumps.into_iter().next()
}

fn probe_dir(root: &Path, name: &str) -> Option<PathBuf> {
    let path = root.join(name);
    path.is_dir().then_some(path)
}

/// Classify the components of an extracted archive tree.
///
/// `name` is the parsed archive file name. Historical `nc_data_only_*`
/// archives keep the data tree at their root, where a user folder may share a
/// marker's name, so they are never probed. Other data-only archives fall
/// back to bare data only when no marker is found.
pub fn detect(root: &Path, name: Option<&ArchiveName>) -> ComponentPresence {
    let mut presence = ComponentPresence::default();

    if name.is_some_and(|name| name.legacy) {
        if has_entries(root) {
            presence.insert(Component::Data, Layout::Bare, root.to_path_buf());
        }
        return presence;
    }

    if let Some(path) = probe_dir(root, MODERN_DATA) {
        presence.insert(Component::Data, Layout::Modern, path);
    } else if let Some(path) = probe_dir(root, LEGACY_DATA) {
        presence.insert(Component::Data, Layout::Legacy, path);
    }

    if let Some(path) = probe_dir(root, MODERN_DB_DIR).and_then(|dir| find_dump(&dir)) {
        presence.insert(Component::Database, Layout::Modern, path);
    } else if let Some(path) = probe_dir(root, LEGACY_DB_DIR).and_then(|dir| find_dump(&dir)) {
        presence.insert(Component::Database, Layout::Legacy, path);
    }

    if let Some(path) = probe_dir(root, MODERN_CONFIG) {
        presence.insert(Component::Config, Layout::Modern, path);
    } else if let Some(path) = probe_dir(root, LEGACY_CONFIG) {
        presence.insert(Component::Config, Layout::Legacy, path);
    }

    if let Some(path) = probe_dir(root, MODERN_APPS) {
        presence.insert(Component::Apps, Layout::Modern, path);
    }

    if let Some(path) = probe_dir(root, MODERN_AUTOMATION) {
        presence.insert(Component::Automation, Layout::Modern, path);
    }

    let data_only = name.is_some_and(|name| name.strategy == Strategy::DataOnly);
    if presence.is_empty() && data_only && has_entries(root) {
        presence.insert(Component::Data, Layout::Bare, root.to_path_buf());
    }

    presence
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
