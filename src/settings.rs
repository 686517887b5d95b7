use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

/// Entry ceilings for the in-memory caches. Zero disables a cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub listing_entries: usize,
    pub work_entries: usize,
    pub navigation_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            listing_entries: 200,
            work_entries: 100,
            navigation_entries: 100,
        }
    }
}

/// Settings for one collection. On load, fields absent from the file keep
/// that collection's own defaults.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSettings {
    pub root: PathBuf,
    pub per_page: usize,
    pub max_per_page: usize,
    pub skip_chapters_on_list: bool,
    /// `Cache-Control: max-age` for the chapter API, in seconds. `null`
    /// sends no header.
    pub chapter_max_age: Option<u32>,
    /// `Cache-Control: max-age` for image bytes, in seconds.
    pub image_max_age: Option<u32>,
}

fn default_per_page() -> usize {
    6
}

fn default_max_per_page() -> usize {
    100
}

impl CollectionSettings {
    pub fn manga_defaults() -> Self {
        Self {
            root: PathBuf::from("./test_manga"),
            per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            skip_chapters_on_list: false,
            chapter_max_age: None,
            image_max_age: None,
        }
    }

    pub fn gallery_defaults() -> Self {
        Self {
            root: PathBuf::from("./test_gallery"),
            per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            skip_chapters_on_list: true,
            chapter_max_age: Some(300),
            image_max_age: Some(86_400),
        }
    }

    fn normalize(mut self) -> Self {
        self.max_per_page = self.max_per_page.max(1);
        self.per_page = self.per_page.clamp(1, self.max_per_page);
        self
    }
}

/// A collection block as written in the settings file. Every field is
/// optional; a max-age given as `null` is kept apart from a missing one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionOverrides {
    root: Option<PathBuf>,
    per_page: Option<usize>,
    max_per_page: Option<usize>,
    skip_chapters_on_list: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    chapter_max_age: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    image_max_age: Option<Option<u32>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

impl CollectionOverrides {
    fn apply(self, mut base: CollectionSettings) -> CollectionSettings {
        if let Some(root) = self.root {
            base.root = root;
        }
        if let Some(per_page) = self.per_page {
            base.per_page = per_page;
        }
        if let Some(max_per_page) = self.max_per_page {
            base.max_per_page = max_per_page;
        }
        if let Some(skip) = self.skip_chapters_on_list {
            base.skip_chapters_on_list = skip;
        }
        if let Some(max_age) = self.chapter_max_age {
            base.chapter_max_age = max_age;
        }
        if let Some(max_age) = self.image_max_age {
            base.image_max_age = max_age;
        }
        base
    }
}

fn manga_settings<'de, D>(deserializer: D) -> Result<CollectionSettings, D::Error>
where
    D: Deserializer<'de>,
{
    CollectionOverrides::deserialize(deserializer)
        .map(|overrides| overrides.apply(CollectionSettings::manga_defaults()))
}

fn gallery_settings<'de, D>(deserializer: D) -> Result<CollectionSettings, D::Error>
where
    D: Deserializer<'de>,
{
    CollectionOverrides::deserialize(deserializer)
        .map(|overrides| overrides.apply(CollectionSettings::gallery_defaults()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSettings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_status_file")]
    pub status_file: Option<PathBuf>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(
        default = "CollectionSettings::manga_defaults",
        deserialize_with = "manga_settings"
    )]
    pub manga: CollectionSettings,
    #[serde(
        default = "CollectionSettings::gallery_defaults",
        deserialize_with = "gallery_settings"
    )]
    pub gallery: CollectionSettings,
    /// Passed through untouched to `/api/config`.
    #[serde(default = "default_frontend")]
    pub frontend: Value,
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp", "bmp"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_status_file() -> Option<PathBuf> {
    Some(PathBuf::from("./data/status.json"))
}

fn default_frontend() -> Value {
    json!({
        "reader": {
            "theme": "dark",
            "auto_hide_toolbar": true,
            "default_zoom": 1.0
        },
        "ui": {
            "language": "zh-TW",
            "search_placeholder": "搜尋漫畫名稱..."
        },
        "performance": {
            "image_cache": true,
            "preload_pages": 2
        }
    })
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            image_extensions: default_image_extensions(),
            status_file: default_status_file(),
            cache: CacheSettings::default(),
            manga: CollectionSettings::manga_defaults(),
            gallery: CollectionSettings::gallery_defaults(),
            frontend: default_frontend(),
        }
    }
}

impl ReaderSettings {
    /// Trims and lowercases extensions (`.JPG` -> `jpg`), drops empty ones
    /// and clamps paging limits.
    pub fn normalize(mut self) -> Self {
        self.server.host = self.server.host.trim().to_string();
        if self.server.host.is_empty() {
            self.server.host = ServerSettings::default().host;
        }

        let mut seen = HashSet::new();
        let mut extensions: Vec<String> = self
            .image_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && seen.insert(ext.clone()))
            .collect();
        if extensions.is_empty() {
            extensions = default_image_extensions();
        }
        self.image_extensions = extensions;

        if let Some(path) = self.status_file.take() {
            if !path.as_os_str().is_empty() {
                self.status_file = Some(path);
            }
        }

        if !self.frontend.is_object() {
            self.frontend = default_frontend();
        }

        self.manga = self.manga.normalize();
        self.gallery = self.gallery.normalize();
        self
    }
}

pub fn load_reader_settings(path: &Path) -> io::Result<ReaderSettings> {
    let bytes = fs::read(path)?;
    let settings: ReaderSettings = serde_json::from_slice(&bytes)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(settings.normalize())
}

pub fn save_reader_settings(path: &Path, settings: &ReaderSettings) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(settings)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, json)
}

pub fn default_settings_path(root: &Path) -> PathBuf {
    root.join("reader_settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_fills_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let path = default_settings_path(temp.path());
        fs::write(
            &path,
            br#"{"manga": {"root": "/srv/manga", "perPage": 12}, "imageExtensions": [".JPG", "png", ""]}"#,
        )
        .expect("write settings");

        let settings = load_reader_settings(&path).expect("load settings");
        assert_eq!(settings.manga.root, PathBuf::from("/srv/manga"));
        assert_eq!(settings.manga.per_page, 12);
        assert!(!settings.manga.skip_chapters_on_list);
        assert_eq!(settings.gallery, CollectionSettings::gallery_defaults());
        assert_eq!(settings.image_extensions, vec!["jpg", "png"]);
        assert_eq!(settings.server, ServerSettings::default());
        assert_eq!(settings.cache, CacheSettings::default());
    }

    #[test]
    fn partial_gallery_block_keeps_gallery_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let path = default_settings_path(temp.path());
        fs::write(
            &path,
            br#"{"gallery": {"root": "/srv/gallery"}, "manga": {"skipChaptersOnList": true}}"#,
        )
        .expect("write settings");

        let settings = load_reader_settings(&path).expect("load settings");
        assert_eq!(settings.gallery.root, PathBuf::from("/srv/gallery"));
        assert!(settings.gallery.skip_chapters_on_list);
        assert_eq!(settings.gallery.chapter_max_age, Some(300));
        assert_eq!(settings.gallery.image_max_age, Some(86_400));
        assert_eq!(settings.gallery.per_page, 6);

        assert_eq!(settings.manga.root, PathBuf::from("./test_manga"));
        assert!(settings.manga.skip_chapters_on_list);
        assert_eq!(settings.manga.chapter_max_age, None);
    }

    #[test]
    fn null_max_age_disables_header() {
        let temp = TempDir::new().expect("temp dir");
        let path = default_settings_path(temp.path());
        fs::write(&path, br#"{"gallery": {"imageMaxAge": null, "chapterMaxAge": 60}}"#)
            .expect("write settings");

        let settings = load_reader_settings(&path).expect("load settings");
        assert_eq!(settings.gallery.image_max_age, None);
        assert_eq!(settings.gallery.chapter_max_age, Some(60));
    }

    #[test]
    fn duplicate_extensions_are_dropped() {
        let mut settings = ReaderSettings::default();
        settings.image_extensions = ["jpg", "png", "JPG", ".png", "webp"]
            .iter()
            .map(|ext| ext.to_string())
            .collect();
        let settings = settings.normalize();
        assert_eq!(settings.image_extensions, vec!["jpg", "png", "webp"]);
    }

    #[test]
    fn null_status_file_disables_store() {
        let temp = TempDir::new().expect("temp dir");
        let path = default_settings_path(temp.path());
        fs::write(&path, br#"{"statusFile": null}"#).expect("write settings");

        let settings = load_reader_settings(&path).expect("load settings");
        assert!(settings.status_file.is_none());
    }

    #[test]
    fn per_page_is_clamped() {
        let mut settings = ReaderSettings::default();
        settings.gallery.per_page = 0;
        settings.manga.per_page = 500;
        settings.manga.max_per_page = 50;
        let settings = settings.normalize();
        assert_eq!(settings.gallery.per_page, 1);
        assert_eq!(settings.manga.per_page, 50);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join("reader_settings.json");
        let mut settings = ReaderSettings::default();
        settings.server.port = 8080;
        settings.gallery.image_max_age = None;

        save_reader_settings(&path, &settings).expect("save settings");
        let loaded = load_reader_settings(&path).expect("load settings");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn malformed_file_is_invalid_data() {
        let temp = TempDir::new().expect("temp dir");
        let path = default_settings_path(temp.path());
        fs::write(&path, b"[1, 2").expect("write settings");

        let err = load_reader_settings(&path).expect_err("should fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
