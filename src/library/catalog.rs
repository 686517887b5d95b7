use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::cache::BoundedCache;
use super::listing::{file_name_of, DirectoryLister};
use super::{Chapter, Collection, WorkPage, WorkQuery, WorkSummary};
use crate::paths;
use crate::status::StatusStore;

/// Cover lookup order by extension.
const COVER_PRIORITY: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"];

pub struct WorkCatalog {
    collection: Collection,
    lister: DirectoryLister,
    works: BoundedCache<(PathBuf, bool), WorkSummary>,
}

impl WorkCatalog {
    pub fn new(collection: Collection, lister: DirectoryLister, cache_entries: usize) -> Self {
        Self {
            collection,
            lister,
            works: BoundedCache::new(cache_entries),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn lister(&self) -> &DirectoryLister {
        &self.lister
    }

    pub fn root(&self) -> &Path {
        self.lister.root()
    }

    /// Filters, sorts and pages the work directories under the root.
    ///
    /// Status filtering needs `status`; without a store the filter is
    /// ignored. Status annotation is applied after the cache lookup so it
    /// always reflects the store.
    pub fn list_works(&self, query: &WorkQuery, status: Option<&StatusStore>) -> WorkPage {
        let page = query.page.max(1);
        let per_page = query.per_page.max(1);
        let root = self.root();

        if !root.is_dir() {
            debug!(root = %root.display(), "collection root missing");
            return WorkPage::empty(page, per_page);
        }

        let mut dirs = match self.lister.subdirectories(root) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "failed to enumerate works");
                return WorkPage::empty(page, per_page);
            }
        };

        let category = self.collection.category();
        if let (Some(filter), Some(store)) = (query.status, status) {
            dirs = store.filter_by_status(category, dirs, filter);
        }
        for keyword in [query.search.as_deref(), query.filter_tag.as_deref()]
            .into_iter()
            .flatten()
        {
            retain_matching(&mut dirs, keyword);
        }

        let total = dirs.len();
        let start = (page - 1).saturating_mul(per_page);

        let works = dirs
            .into_iter()
            .skip(start)
            .take(per_page)
            .map(|dir| {
                let mut summary = self.works.get_or_insert_with(
                    (dir.clone(), query.skip_chapter_detail),
                    || self.summarize(&dir, query.skip_chapter_detail),
                );
                if let Some(store) = status {
                    summary.status = Some(store.get_status(category, &summary.name));
                }
                summary
            })
            .collect();

        WorkPage {
            works,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }

    fn summarize(&self, dir: &Path, skip_chapter_detail: bool) -> WorkSummary {
        let (chapters, chapter_count) = if skip_chapter_detail {
            (Vec::new(), self.quick_chapter_count(dir))
        } else {
            let chapters = self.get_chapters(dir);
            let count = chapters.len();
            (chapters, count)
        };

        WorkSummary {
            name: file_name_of(dir),
            path: paths::relative_url(self.root(), dir).unwrap_or_default(),
            chapters,
            chapter_count,
            cover_image: self.get_cover_image(dir),
            status: None,
        }
    }

    /// Manga count subdirectories; galleries count their direct images.
    fn quick_chapter_count(&self, dir: &Path) -> usize {
        match self.collection {
            Collection::Manga => self
                .lister
                .subdirectories(dir)
                .map(|dirs| dirs.len())
                .unwrap_or(0),
            Collection::Gallery => self.lister.count_images(dir),
        }
    }

    /// Chapters of `work_dir` in natural order.
    ///
    /// Subdirectories with at least one image are chapters. A work without
    /// subdirectories is a single chapter named after itself when the
    /// collection accepts flat albums and it holds images directly.
    pub fn get_chapters(&self, work_dir: &Path) -> Vec<Chapter> {
        if !work_dir.is_dir() {
            return Vec::new();
        }

        let subdirs = match self.lister.subdirectories(work_dir) {
            Ok(subdirs) => subdirs,
            Err(err) => {
                warn!(dir = %work_dir.display(), error = %err, "failed to enumerate chapters");
                return Vec::new();
            }
        };

        if subdirs.is_empty() {
            if !self.collection.accepts_flat_albums() {
                return Vec::new();
            }
            return self.chapter_at(work_dir).into_iter().collect();
        }

        subdirs
            .iter()
            .filter_map(|dir| self.chapter_at(dir))
            .collect()
    }

    fn chapter_at(&self, dir: &Path) -> Option<Chapter> {
        let image_count = self.lister.list_images(dir).len();
        if image_count == 0 {
            return None;
        }
        Some(Chapter {
            name: file_name_of(dir),
            path: paths::relative_url(self.root(), dir)?,
            image_count,
            status: None,
        })
    }

    /// First image by extension priority; for each extension the work
    /// directory is searched before its naturally-first subdirectory.
    pub fn get_cover_image(&self, work_dir: &Path) -> Option<String> {
        let top_files = self.lister.file_names(work_dir).unwrap_or_default();
        let first_subdir = self
            .lister
            .subdirectories(work_dir)
            .ok()
            .and_then(|dirs| dirs.into_iter().next())
            .map(|dir| {
                let files = self.lister.file_names(&dir).unwrap_or_default();
                (dir, files)
            });

        for ext in COVER_PRIORITY {
            if let Some(name) = find_with_extension(&top_files, ext) {
                return paths::relative_url(self.root(), &work_dir.join(name));
            }
            if let Some((dir, files)) = &first_subdir {
                if let Some(name) = find_with_extension(files, ext) {
                    return paths::relative_url(self.root(), &dir.join(name));
                }
            }
        }

        None
    }
}

fn find_with_extension<'a>(names: &'a [String], ext: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|name| {
            Path::new(name.as_str())
                .extension()
                .and_then(|value| value.to_str())
                .is_some_and(|value| value.eq_ignore_ascii_case(ext))
        })
        .map(String::as_str)
}

fn retain_matching(dirs: &mut Vec<PathBuf>, keyword: &str) {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return;
    }
    dirs.retain(|dir| file_name_of(dir).to_lowercase().contains(&keyword));
}
