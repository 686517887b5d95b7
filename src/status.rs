use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

pub const CATEGORY_MANGA: &str = "manga";
pub const CATEGORY_GALLERY: &str = "gallery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Favorite,
    Reviewed,
    /// Virtual state: present in neither persisted list.
    Unreviewed,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Favorite => "favorite",
            StatusKind::Reviewed => "reviewed",
            StatusKind::Unreviewed => "unreviewed",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid status value: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for StatusKind {
    type Err = StatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "favorite" => Ok(StatusKind::Favorite),
            "reviewed" => Ok(StatusKind::Reviewed),
            "unreviewed" => Ok(StatusKind::Unreviewed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusPersistError {
    #[error("failed to write status file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize status document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to replace status file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// On-disk lists for one category. Older files may still carry an
/// `unreviewed` list; it is ignored on load and never written back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLists {
    #[serde(default)]
    pub favorite: Vec<String>,
    #[serde(default)]
    pub reviewed: Vec<String>,
}

impl CategoryLists {
    fn remove(&mut self, item_id: &str) {
        self.favorite.retain(|item| item != item_id);
        self.reviewed.retain(|item| item != item_id);
    }
}

pub type StatusDocument = BTreeMap<String, CategoryLists>;

fn empty_document() -> StatusDocument {
    let mut document = StatusDocument::new();
    document.insert(CATEGORY_MANGA.to_string(), CategoryLists::default());
    document.insert(CATEGORY_GALLERY.to_string(), CategoryLists::default());
    document
}

/// Favorite/reviewed bookkeeping per category, persisted as one JSON file.
///
/// Every mutation rewrites the whole file while the document lock is held,
/// so concurrent `set_status` calls serialize instead of overwriting each
/// other.
#[derive(Debug)]
pub struct StatusStore {
    path: PathBuf,
    document: Mutex<StatusDocument>,
}

impl StatusStore {
    /// Loads `path`, creating it with empty lists when absent. A malformed
    /// file is logged and replaced in memory by an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let exists = path.exists();
        let document = if exists {
            load_document(&path)
        } else {
            empty_document()
        };

        let store = Self {
            path,
            document: Mutex::new(document),
        };

        if !exists {
            let guard = store.lock();
            if let Err(err) = persist_document(&store.path, &guard) {
                warn!(path = %store.path.display(), error = %err, "failed to create status file");
            }
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StatusDocument> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_status(&self, category: &str, item_id: &str) -> StatusKind {
        let guard = self.lock();
        let Some(lists) = guard.get(category) else {
            return StatusKind::Unreviewed;
        };

        if lists.favorite.iter().any(|item| item == item_id) {
            StatusKind::Favorite
        } else if lists.reviewed.iter().any(|item| item == item_id) {
            StatusKind::Reviewed
        } else {
            StatusKind::Unreviewed
        }
    }

    /// Moves `item_id` into the list for `status` (or out of both lists for
    /// `Unreviewed`) and rewrites the file. Write failures are logged; the
    /// in-memory change is kept.
    pub fn set_status(&self, category: &str, item_id: &str, status: StatusKind) {
        let mut guard = self.lock();
        let lists = guard.entry(category.to_string()).or_default();
        lists.remove(item_id);

        match status {
            StatusKind::Favorite => lists.favorite.push(item_id.to_string()),
            StatusKind::Reviewed => lists.reviewed.push(item_id.to_string()),
            StatusKind::Unreviewed => {}
        }

        debug!(category, item_id, status = %status, "status updated");

        if let Err(err) = persist_document(&self.path, &guard) {
            warn!(path = %self.path.display(), error = %err, "failed to save status file");
        }
    }

    /// Persisted members of `status`. `Unreviewed` has no stored members and
    /// always yields an empty list; use [`StatusStore::filter_by_status`].
    pub fn get_items_by_status(&self, category: &str, status: StatusKind) -> Vec<String> {
        let guard = self.lock();
        let Some(lists) = guard.get(category) else {
            return Vec::new();
        };

        match status {
            StatusKind::Favorite => lists.favorite.clone(),
            StatusKind::Reviewed => lists.reviewed.clone(),
            StatusKind::Unreviewed => Vec::new(),
        }
    }

    /// Keeps the items whose basename has `status`. Unreviewed is everything
    /// not listed as favorite or reviewed.
    pub fn filter_by_status<T: AsRef<Path>>(
        &self,
        category: &str,
        items: Vec<T>,
        status: StatusKind,
    ) -> Vec<T> {
        let (favorite, reviewed): (HashSet<String>, HashSet<String>) = {
            let guard = self.lock();
            match guard.get(category) {
                Some(lists) => (
                    lists.favorite.iter().cloned().collect(),
                    lists.reviewed.iter().cloned().collect(),
                ),
                None => (HashSet::new(), HashSet::new()),
            }
        };

        items
            .into_iter()
            .filter(|item| {
                let name = item
                    .as_ref()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match status {
                    StatusKind::Favorite => favorite.contains(&name),
                    StatusKind::Reviewed => reviewed.contains(&name),
                    StatusKind::Unreviewed => {
                        !favorite.contains(&name) && !reviewed.contains(&name)
                    }
                }
            })
            .collect()
    }

    pub fn get_all_statuses(&self, category: &str) -> HashMap<String, StatusKind> {
        let guard = self.lock();
        let mut statuses = HashMap::new();
        if let Some(lists) = guard.get(category) {
            for item in &lists.reviewed {
                statuses.insert(item.clone(), StatusKind::Reviewed);
            }
            // favorite wins if a hand-edited file lists an item twice
            for item in &lists.favorite {
                statuses.insert(item.clone(), StatusKind::Favorite);
            }
        }
        statuses
    }
}

fn load_document(path: &Path) -> StatusDocument {
    let parsed = fs::read(path)
        .map_err(|err| err.to_string())
        .and_then(|bytes| {
            serde_json::from_slice::<StatusDocument>(&bytes).map_err(|err| err.to_string())
        });

    match parsed {
        Ok(mut document) => {
            for category in [CATEGORY_MANGA, CATEGORY_GALLERY] {
                document.entry(category.to_string()).or_default();
            }
            document
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to load status file, starting empty");
            empty_document()
        }
    }
}

fn persist_document(path: &Path, document: &StatusDocument) -> Result<(), StatusPersistError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    serde_json::to_writer_pretty(&mut temp, document)?;
    temp.write_all(b"\n")?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}
