//! Minimal HTML shells. They carry only the collection and the API base in
//! `data-` attributes; no static assets are served, so any client UI reads
//! everything from the JSON API.

use crate::library::Collection;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn shell(collection: Collection, extra_attrs: &str) -> String {
    let category = collection.category();
    format!(
        "<!DOCTYPE html>\n<html lang=\"zh-TW\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n</head>\n\
         <body data-category=\"{category}\" data-api=\"/{category}/api\"{extra_attrs}>\n\
         <main id=\"app\"></main>\n</body>\n</html>\n",
        title = escape(collection.title()),
    )
}

pub fn index_page(collection: Collection) -> String {
    shell(collection, "")
}

pub fn reader_page(collection: Collection, chapter_path: &str) -> String {
    shell(
        collection,
        &format!(" data-chapter-path=\"{}\"", escape(chapter_path)),
    )
}
