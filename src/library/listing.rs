use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::cache::BoundedCache;
use crate::paths;

/// Alphanumeric ordering: digit runs compare as numbers, everything else
/// case-insensitively, so `page2` sorts before `page10`. Names equal under
/// that rule fall back to byte order to keep the result stable.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare_ignore_case(a, b).then_with(|| a.cmp(b))
}

pub fn sort_natural(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Direct children of `dir`. Only a failure to open `dir` itself is an
/// error; unreadable entries such as dangling symlinks are logged and
/// skipped.
fn direct_entries(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
            }
        }
    }
    Ok(entries)
}

fn scan_file_names(dir: &Path, keep: impl Fn(&Path) -> bool) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in direct_entries(dir)? {
        if !entry.file_type().is_file() || !keep(entry.path()) {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => names.push(name.to_string()),
            None => warn!(path = %entry.path().display(), "skipping file with non UTF-8 name"),
        }
    }
    Ok(names)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePage {
    pub images: Vec<String>,
    pub total: usize,
}

/// Lists image files directly inside a directory, as root-relative URL
/// paths in natural order.
pub struct DirectoryLister {
    root: PathBuf,
    extensions: Vec<String>,
    cache: BoundedCache<PathBuf, Arc<Vec<String>>>,
}

impl DirectoryLister {
    /// `extensions` are matched case-insensitively, with or without a
    /// leading dot.
    pub fn new(root: impl Into<PathBuf>, extensions: &[String], cache_entries: usize) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            cache: BoundedCache::new(cache_entries),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    /// Unsorted names of the image files directly in `dir`.
    fn image_file_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        scan_file_names(dir, |path| self.is_image(path))
    }

    /// Names of every regular file directly in `dir`, in natural order.
    pub fn file_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = scan_file_names(dir, |_| true)?;
        sort_natural(&mut names);
        Ok(names)
    }

    fn to_urls(&self, dir: &Path, names: &[String]) -> Option<Vec<String>> {
        names
            .iter()
            .map(|name| paths::relative_url(&self.root, &dir.join(name)))
            .collect()
    }

    fn sorted_urls(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = self.image_file_names(dir)?;
        sort_natural(&mut names);
        self.to_urls(dir, &names).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is outside the library root", dir.display()),
            )
        })
    }

    /// Every image in `dir`. Missing directories and enumeration errors
    /// produce an empty list.
    pub fn list_images(&self, dir: &Path) -> Vec<String> {
        if !dir.is_dir() {
            return Vec::new();
        }

        let key = dir.to_path_buf();
        if let Some(hit) = self.cache.get(&key) {
            return hit.as_ref().clone();
        }

        match self.sorted_urls(dir) {
            Ok(images) => {
                let images = Arc::new(images);
                self.cache.insert(key, Arc::clone(&images));
                images.as_ref().clone()
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to list images");
                Vec::new()
            }
        }
    }

    /// One page of `dir` in natural order plus the exact image count.
    ///
    /// The whole directory is enumerated, but only the first
    /// `offset + limit` names are ordered.
    pub fn list_images_paginated(&self, dir: &Path, offset: usize, limit: usize) -> ImagePage {
        let empty = ImagePage {
            images: Vec::new(),
            total: 0,
        };
        if !dir.is_dir() {
            return empty;
        }

        if let Some(hit) = self.cache.get(&dir.to_path_buf()) {
            let images = hit.iter().skip(offset).take(limit).cloned().collect();
            return ImagePage {
                images,
                total: hit.len(),
            };
        }

        let mut names = match self.image_file_names(dir) {
            Ok(names) => names,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to list images");
                return empty;
            }
        };

        let total = names.len();
        if offset >= total {
            return ImagePage {
                images: Vec::new(),
                total,
            };
        }

        let end = offset.saturating_add(limit).min(total);
        if end < total {
            names.select_nth_unstable_by(end, |a, b| natural_cmp(a, b));
            names.truncate(end);
        }
        sort_natural(&mut names);

        match self.to_urls(dir, &names[offset..]) {
            Some(images) => ImagePage { images, total },
            None => {
                warn!(dir = %dir.display(), "directory is outside the library root");
                empty
            }
        }
    }

    /// Number of images directly in `dir`, without sorting.
    pub fn count_images(&self, dir: &Path) -> usize {
        if let Some(hit) = self.cache.get(&dir.to_path_buf()) {
            return hit.len();
        }
        match self.image_file_names(dir) {
            Ok(names) => names.len(),
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "failed to count images");
                0
            }
        }
    }

    /// Immediate subdirectories of `dir` in natural order of their names.
    pub fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = direct_entries(dir)?
            .into_iter()
            .filter(|entry| entry.file_type().is_dir())
            .map(DirEntry::into_path)
            .collect();
        dirs.sort_by(|a, b| natural_cmp(&file_name_of(a), &file_name_of(b)));
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str) {
        let path = dir.join(name);
        let mut file = File::create(path).expect("create file");
        file.write_all(b"test").expect("write file");
    }

    fn lister(root: &Path) -> DirectoryLister {
        let extensions: Vec<String> = ["jpg", ".PNG", "webp"].iter().map(|e| e.to_string()).collect();
        DirectoryLister::new(root, &extensions, 16)
    }

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        let mut names = vec!["page2".to_string(), "page10".to_string(), "page1".to_string()];
        sort_natural(&mut names);
        assert_eq!(names, vec!["page1", "page2", "page10"]);

        let mut mixed = vec!["B2".to_string(), "a10".to_string(), "a9".to_string()];
        sort_natural(&mut mixed);
        assert_eq!(mixed, vec!["a9", "a10", "B2"]);
    }

    #[test]
    fn list_images_filters_and_sorts() {
        let temp = TempDir::new().expect("temp dir");
        let chapter = temp.path().join("Work").join("Ch1");
        fs::create_dir_all(&chapter).expect("create chapter");
        write_file(&chapter, "page10.jpg");
        write_file(&chapter, "page2.PNG");
        write_file(&chapter, "page1.webp");
        write_file(&chapter, "notes.txt");
        fs::create_dir(chapter.join("extras.jpg")).expect("create dir");

        let images = lister(temp.path()).list_images(&chapter);
        assert_eq!(
            images,
            vec!["Work/Ch1/page1.webp", "Work/Ch1/page2.PNG", "Work/Ch1/page10.jpg"]
        );
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let temp = TempDir::new().expect("temp dir");
        let lister = lister(temp.path());
        assert!(lister.list_images(&temp.path().join("absent")).is_empty());
        let page = lister.list_images_paginated(&temp.path().join("absent"), 0, 10);
        assert_eq!(page.total, 0);
        assert!(page.images.is_empty());
    }

    #[test]
    fn cached_listing_ignores_new_files() {
        let temp = TempDir::new().expect("temp dir");
        write_file(temp.path(), "1.jpg");
        let lister = lister(temp.path());

        assert_eq!(lister.list_images(temp.path()).len(), 1);
        write_file(temp.path(), "2.jpg");
        assert_eq!(lister.list_images(temp.path()).len(), 1);

        let uncached = DirectoryLister::new(temp.path(), &["jpg".to_string()], 0);
        assert_eq!(uncached.list_images(temp.path()).len(), 2);
    }

    #[test]
    fn paginated_listing_returns_correct_pages_and_total() {
        let temp = TempDir::new().expect("temp dir");
        for index in (1..=25).rev() {
            write_file(temp.path(), &format!("img{index}.jpg"));
        }
        let lister = DirectoryLister::new(temp.path(), &["jpg".to_string()], 0);

        let first = lister.list_images_paginated(temp.path(), 0, 10);
        assert_eq!(first.total, 25);
        assert_eq!(first.images.first().map(String::as_str), Some("img1.jpg"));
        assert_eq!(first.images.last().map(String::as_str), Some("img10.jpg"));

        let last = lister.list_images_paginated(temp.path(), 20, 10);
        assert_eq!(
            last.images,
            vec!["img21.jpg", "img22.jpg", "img23.jpg", "img24.jpg", "img25.jpg"]
        );

        let beyond = lister.list_images_paginated(temp.path(), 30, 10);
        assert!(beyond.images.is_empty());
        assert_eq!(beyond.total, 25);
    }

    #[test]
    fn paginated_listing_matches_full_listing() {
        let temp = TempDir::new().expect("temp dir");
        for name in ["b3.jpg", "a1.jpg", "b20.jpg", "A2.jpg", "c.jpg", "b100.jpg"] {
            write_file(temp.path(), name);
        }
        let lister = DirectoryLister::new(temp.path(), &["jpg".to_string()], 0);
        let full = lister.list_images(temp.path());

        for offset in 0..full.len() {
            let page = lister.list_images_paginated(temp.path(), offset, 2);
            let expected: Vec<String> = full.iter().skip(offset).take(2).cloned().collect();
            assert_eq!(page.images, expected, "offset {offset}");
        }
    }

    #[test]
    fn subdirectories_are_naturally_sorted() {
        let temp = TempDir::new().expect("temp dir");
        for name in ["Ch10", "Ch2", "Ch1"] {
            fs::create_dir(temp.path().join(name)).expect("create dir");
        }
        write_file(temp.path(), "cover.jpg");

        let dirs = lister(temp.path())
            .subdirectories(temp.path())
            .expect("subdirectories");
        let names: Vec<String> = dirs.iter().map(|dir| file_name_of(dir)).collect();
        assert_eq!(names, vec!["Ch1", "Ch2", "Ch10"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_do_not_hide_siblings() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().expect("temp dir");
        write_file(temp.path(), "1.jpg");
        write_file(temp.path(), "2.jpg");
        symlink(temp.path().join("missing.jpg"), temp.path().join("link.jpg")).expect("symlink");
        for name in ["B", "A"] {
            fs::create_dir(temp.path().join(name)).expect("create dir");
        }
        symlink(temp.path().join("gone"), temp.path().join("dead")).expect("symlink");

        let lister = DirectoryLister::new(temp.path(), &["jpg".to_string()], 0);
        assert_eq!(lister.list_images(temp.path()), vec!["1.jpg", "2.jpg"]);
        assert_eq!(lister.count_images(temp.path()), 2);
        assert_eq!(lister.list_images_paginated(temp.path(), 0, 10).total, 2);

        let dirs = lister.subdirectories(temp.path()).expect("subdirectories");
        let names: Vec<String> = dirs.iter().map(|dir| file_name_of(dir)).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_skipped_without_hiding_others() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().expect("temp dir");
        write_file(temp.path(), "ok.jpg");
        File::create(temp.path().join(OsStr::from_bytes(b"bad\xff.jpg"))).expect("create file");

        let lister = DirectoryLister::new(temp.path(), &["jpg".to_string()], 0);
        assert_eq!(lister.list_images(temp.path()), vec!["ok.jpg"]);
    }

    #[test]
    fn unopenable_directory_is_an_error() {
        let temp = TempDir::new().expect("temp dir");
        let lister = lister(temp.path());
        assert!(lister.subdirectories(&temp.path().join("absent")).is_err());
        assert!(lister.file_names(&temp.path().join("absent")).is_err());
    }

    #[test]
    fn count_images_skips_other_files() {
        let temp = TempDir::new().expect("temp dir");
        write_file(temp.path(), "a.jpg");
        write_file(temp.path(), "b.webp");
        write_file(temp.path(), "c.gif");
        assert_eq!(lister(temp.path()).count_images(temp.path()), 2);
    }
}
