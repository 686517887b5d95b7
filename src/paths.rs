use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use percent_encoding::percent_decode_str;

/// Turns a URL path (`Work/Chapter%201`) into a native relative path.
///
/// Both `/` and `\` are accepted as separators. An empty input yields an
/// empty path.
pub fn decode(url_path: &str) -> PathBuf {
    if url_path.is_empty() {
        return PathBuf::new();
    }

    let decoded = percent_decode_str(url_path).decode_utf8_lossy();
    let normalized: String = decoded
        .chars()
        .map(|ch| match ch {
            '/' | '\\' => MAIN_SEPARATOR,
            other => other,
        })
        .collect();

    PathBuf::from(normalized)
}

/// Joins native components with `/`. Percent-encoding is not re-applied.
pub fn encode(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        let part = component.as_os_str().to_string_lossy();
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(&part);
    }
    out
}

/// Decodes `url_path` and joins it onto `root`, refusing anything that could
/// leave `root` (`..`, absolute paths, drive prefixes).
pub fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = decode(url_path);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(root.join(relative))
}

/// Root-relative URL path of `path`, or `None` when `path` is outside `root`.
pub fn relative_url(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(encode)
}
