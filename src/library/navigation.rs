use serde::Serialize;

use super::cache::BoundedCache;
use super::catalog::WorkCatalog;
use super::listing::file_name_of;
use super::Chapter;
use crate::paths;

/// Previous/next links for the reader.
///
/// When the chapter cannot be placed among its work's chapters only
/// `work_name` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub prev: Option<Chapter>,
    pub next: Option<Chapter>,
    #[serde(rename = "manga_name")]
    pub work_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_chapter: Option<Chapter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chapters: Option<usize>,
    /// 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
}

impl Navigation {
    fn unplaced(work_name: String) -> Self {
        Self {
            prev: None,
            next: None,
            work_name,
            current_chapter: None,
            total_chapters: None,
            current_index: None,
        }
    }
}

pub struct ChapterNavigator {
    cache: BoundedCache<String, Navigation>,
}

impl ChapterNavigator {
    pub fn new(cache_entries: usize) -> Self {
        Self {
            cache: BoundedCache::new(cache_entries),
        }
    }

    pub fn get_navigation(&self, catalog: &WorkCatalog, chapter_path: &str) -> Navigation {
        self.cache
            .get_or_insert_with(chapter_path.to_string(), || locate(catalog, chapter_path))
    }
}

fn locate(catalog: &WorkCatalog, chapter_path: &str) -> Navigation {
    let root = catalog.root();
    let relative = paths::decode(chapter_path);
    let Some(full) = paths::resolve(root, chapter_path) else {
        return Navigation::unplaced(String::new());
    };
    let Some(work_dir) = full.parent().filter(|_| relative.components().next().is_some()) else {
        return Navigation::unplaced(String::new());
    };

    // A work sitting directly under the root is its own only chapter.
    if work_dir == root {
        let name = file_name_of(&full);
        let image_count = catalog.lister().list_images(&full).len();
        return Navigation {
            prev: None,
            next: None,
            work_name: name.clone(),
            current_chapter: Some(Chapter {
                name,
                path: chapter_path.to_string(),
                image_count,
                status: None,
            }),
            total_chapters: Some(1),
            current_index: Some(1),
        };
    }

    let work_name = file_name_of(work_dir);
    let chapters = catalog.get_chapters(work_dir);
    let Some(index) = chapters
        .iter()
        .position(|chapter| paths::decode(&chapter.path) == relative)
    else {
        return Navigation::unplaced(work_name);
    };

    Navigation {
        prev: index.checked_sub(1).map(|prev| chapters[prev].clone()),
        next: chapters.get(index + 1).cloned(),
        work_name,
        current_chapter: Some(chapters[index].clone()),
        total_chapters: Some(chapters.len()),
        current_index: Some(index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{Collection, DirectoryLister};
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str) {
        fs::create_dir_all(dir).expect("create dir");
        let mut file = File::create(dir.join(name)).expect("create file");
        file.write_all(b"test").expect("write file");
    }

    fn three_chapter_work(root: &Path) {
        for chapter in ["Ch1", "Ch2", "Ch3"] {
            write_file(&root.join("Work").join(chapter), "001.jpg");
        }
    }

    fn catalog(collection: Collection, root: &Path) -> WorkCatalog {
        WorkCatalog::new(
            collection,
            DirectoryLister::new(root, &["jpg".to_string()], 16),
            16,
        )
    }

    #[test]
    fn first_and_last_chapters_have_open_ends() {
        let temp = TempDir::new().expect("temp dir");
        three_chapter_work(temp.path());
        let catalog = catalog(Collection::Manga, temp.path());
        let navigator = ChapterNavigator::new(16);

        let first = navigator.get_navigation(&catalog, "Work/Ch1");
        assert!(first.prev.is_none());
        assert_eq!(first.next.as_ref().map(|c| c.path.as_str()), Some("Work/Ch2"));
        assert_eq!(first.current_index, Some(1));
        assert_eq!(first.total_chapters, Some(3));
        assert_eq!(first.work_name, "Work");

        let middle = navigator.get_navigation(&catalog, "Work/Ch2");
        assert_eq!(middle.prev.as_ref().map(|c| c.name.as_str()), Some("Ch1"));
        assert_eq!(middle.next.as_ref().map(|c| c.name.as_str()), Some("Ch3"));

        let last = navigator.get_navigation(&catalog, "Work/Ch3");
        assert!(last.next.is_none());
        assert_eq!(last.prev.as_ref().map(|c| c.path.as_str()), Some("Work/Ch2"));
        assert_eq!(last.current_index, Some(3));
    }

    #[test]
    fn unknown_chapter_keeps_work_name() {
        let temp = TempDir::new().expect("temp dir");
        three_chapter_work(temp.path());
        let catalog = catalog(Collection::Manga, temp.path());
        let navigator = ChapterNavigator::new(0);

        let nav = navigator.get_navigation(&catalog, "Work/Ch9");
        assert!(nav.prev.is_none());
        assert!(nav.next.is_none());
        assert_eq!(nav.work_name, "Work");
        assert!(nav.current_chapter.is_none());

        let empty_work = navigator.get_navigation(&catalog, "Ghost/Ch1");
        assert_eq!(empty_work.work_name, "Ghost");
        assert!(empty_work.prev.is_none() && empty_work.next.is_none());
    }

    #[test]
    fn percent_encoded_paths_match_chapters() {
        let temp = TempDir::new().expect("temp dir");
        write_file(&temp.path().join("My Work").join("Chapter 1"), "1.jpg");
        write_file(&temp.path().join("My Work").join("Chapter 2"), "1.jpg");
        let catalog = catalog(Collection::Manga, temp.path());
        let navigator = ChapterNavigator::new(16);

        let nav = navigator.get_navigation(&catalog, "My%20Work/Chapter%201");
        assert_eq!(nav.current_index, Some(1));
        assert_eq!(
            nav.next.as_ref().map(|c| c.path.as_str()),
            Some("My Work/Chapter 2")
        );
    }

    #[test]
    fn work_under_root_is_single_chapter() {
        let temp = TempDir::new().expect("temp dir");
        write_file(&temp.path().join("Album"), "1.jpg");
        write_file(&temp.path().join("Album"), "2.jpg");
        let catalog = catalog(Collection::Gallery, temp.path());
        let navigator = ChapterNavigator::new(16);

        let nav = navigator.get_navigation(&catalog, "Album");
        assert!(nav.prev.is_none() && nav.next.is_none());
        assert_eq!(nav.work_name, "Album");
        assert_eq!(nav.total_chapters, Some(1));
        assert_eq!(nav.current_index, Some(1));
        let current = nav.current_chapter.expect("current chapter");
        assert_eq!(current.path, "Album");
        assert_eq!(current.image_count, 2);
    }

    #[test]
    fn escaping_or_empty_paths_are_unplaced() {
        let temp = TempDir::new().expect("temp dir");
        three_chapter_work(temp.path());
        let catalog = catalog(Collection::Manga, temp.path());
        let navigator = ChapterNavigator::new(16);

        assert_eq!(
            navigator.get_navigation(&catalog, "../Work/Ch1"),
            Navigation::unplaced(String::new())
        );
        assert_eq!(
            navigator.get_navigation(&catalog, ""),
            Navigation::unplaced(String::new())
        );
    }

    #[test]
    fn serialized_shape_uses_manga_name() {
        let nav = Navigation::unplaced("Work".to_string());
        let json = serde_json::to_value(&nav).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"prev": null, "next": null, "manga_name": "Work"})
        );
    }
}
