//! Directory-backed catalog of works and chapters.
//!
//! A collection root holds one directory per work. A work is either
//! chaptered (one subdirectory of images per chapter) or, for collections
//! that allow it, a flat album whose own images form a single chapter.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::paths;
use crate::settings::CacheSettings;
use crate::status::{StatusKind, StatusStore, CATEGORY_GALLERY, CATEGORY_MANGA};

pub mod cache;
pub mod catalog;
pub mod listing;
pub mod navigation;

pub use catalog::WorkCatalog;
pub use listing::{natural_cmp, DirectoryLister, ImagePage};
pub use navigation::{ChapterNavigator, Navigation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Manga,
    Gallery,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Manga, Collection::Gallery];

    /// Status namespace and URL prefix.
    pub fn category(self) -> &'static str {
        match self {
            Collection::Manga => CATEGORY_MANGA,
            Collection::Gallery => CATEGORY_GALLERY,
        }
    }

    pub fn accepts_flat_albums(self) -> bool {
        matches!(self, Collection::Gallery)
    }

    pub fn title(self) -> &'static str {
        match self {
            Collection::Manga => "漫畫閱讀器",
            Collection::Gallery => "Gallery作品閱讀器",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub name: String,
    pub path: String,
    pub image_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkSummary {
    pub name: String,
    pub path: String,
    /// Empty when the listing skipped chapter detail.
    pub chapters: Vec<Chapter>,
    pub chapter_count: usize,
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkPage {
    /// Named `mangas` for both collections; the web client expects it.
    #[serde(rename = "mangas")]
    pub works: Vec<WorkSummary>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl WorkPage {
    pub fn empty(page: usize, per_page: usize) -> Self {
        Self {
            works: Vec::new(),
            total: 0,
            page,
            per_page,
            total_pages: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkDetail {
    pub name: String,
    pub path: String,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkQuery {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
    pub skip_chapter_detail: bool,
    pub search: Option<String>,
    pub filter_tag: Option<String>,
    pub status: Option<StatusKind>,
}

/// Everything one collection serves: listing, detail, reader pages and
/// navigation over a single root directory.
pub struct Library {
    catalog: WorkCatalog,
    navigator: ChapterNavigator,
}

impl Library {
    pub fn new(
        collection: Collection,
        root: impl Into<PathBuf>,
        extensions: &[String],
        cache: &CacheSettings,
    ) -> Self {
        let lister = DirectoryLister::new(root, extensions, cache.listing_entries);
        Self {
            catalog: WorkCatalog::new(collection, lister, cache.work_entries),
            navigator: ChapterNavigator::new(cache.navigation_entries),
        }
    }

    pub fn collection(&self) -> Collection {
        self.catalog.collection()
    }

    pub fn root(&self) -> &Path {
        self.catalog.root()
    }

    pub fn catalog(&self) -> &WorkCatalog {
        &self.catalog
    }

    pub fn list_works(&self, query: &WorkQuery, status: Option<&StatusStore>) -> WorkPage {
        self.catalog.list_works(query, status)
    }

    /// `None` when `work_path` does not name an existing directory.
    ///
    /// With a status store every chapter carries its own status (keyed by
    /// chapter path); `filter` then keeps only chapters in that state.
    pub fn work_detail(
        &self,
        work_path: &str,
        filter: Option<StatusKind>,
        status: Option<&StatusStore>,
    ) -> Option<WorkDetail> {
        let full = paths::resolve(self.root(), work_path)?;
        if !full.is_dir() {
            return None;
        }

        let mut chapters = self.catalog.get_chapters(&full);
        if let Some(store) = status {
            let category = self.collection().category();
            for chapter in &mut chapters {
                chapter.status = Some(store.get_status(category, &chapter.path));
            }
            if let Some(wanted) = filter {
                chapters.retain(|chapter| chapter.status == Some(wanted));
            }
        }

        Some(WorkDetail {
            name: listing::file_name_of(&full),
            path: work_path.to_string(),
            chapters,
        })
    }

    /// `None` when `chapter_path` does not name an existing directory.
    pub fn chapter_images(&self, chapter_path: &str) -> Option<Vec<String>> {
        let full = self.existing_dir(chapter_path)?;
        Some(self.catalog.lister().list_images(&full))
    }

    pub fn chapter_images_page(
        &self,
        chapter_path: &str,
        offset: usize,
        limit: usize,
    ) -> Option<ImagePage> {
        let full = self.existing_dir(chapter_path)?;
        Some(
            self.catalog
                .lister()
                .list_images_paginated(&full, offset, limit),
        )
    }

    pub fn navigation(&self, chapter_path: &str) -> Navigation {
        self.navigator.get_navigation(&self.catalog, chapter_path)
    }

    /// Filesystem path of an image inside the root, if it exists.
    pub fn image_file(&self, image_path: &str) -> Option<PathBuf> {
        let full = paths::resolve(self.root(), image_path)?;
        full.is_file().then_some(full)
    }

    fn existing_dir(&self, url_path: &str) -> Option<PathBuf> {
        let full = paths::resolve(self.root(), url_path)?;
        full.is_dir().then_some(full)
    }
}
