//! Listing page: a view model built from drive data, then rendered to HTML.

use std::fmt::Write as _;

use chrono::DateTime;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::{FolderMap, HOME};
use crate::drive::FileEntry;

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Like [`SEGMENT`] but keeps `/` so nested file names stay readable.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const PREVIEWABLE: [&str; 6] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "video/mp4",
    "text/plain",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLink {
    pub alias: String,
    pub folder_id: String,
    pub href: String,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub icon: &'static str,
    pub href: String,
    pub size: String,
    pub modified: String,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub previous: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingView {
    pub title: String,
    pub folders: Vec<FolderLink>,
    pub rows: Vec<Row>,
    pub pagination: Option<Pagination>,
}

impl ListingView {
    pub fn build(files: &[FileEntry], folders: &FolderMap, alias: &str, page: u32, has_next: bool) -> Self {
        let title = if folders.len() > 1 && alias != HOME {
            format!("Google Drive Index - {alias}")
        } else {
            "Google Drive Index".to_string()
        };

        let folder_links = if folders.len() > 1 {
            folders
                .iter()
                .map(|(name, id)| FolderLink {
                    alias: name.to_string(),
                    folder_id: id.to_string(),
                    href: folder_href(name),
                    current: name == alias,
                })
                .collect()
        } else {
            Vec::new()
        };

        let pagination = (page > 1 || has_next).then(|| Pagination {
            current: page,
            previous: match page {
                0 | 1 => None,
                2 => Some(folder_href(alias)),
                n => Some(page_href(alias, n - 1)),
            },
            next: has_next.then(|| page_href(alias, page + 1)),
        });

        Self {
            title,
            folders: folder_links,
            rows: files.iter().map(|file| Row::build(file, alias)).collect(),
            pagination,
        }
    }
}

impl Row {
    fn build(file: &FileEntry, alias: &str) -> Self {
        let folder = file.is_folder();
        Self {
            name: file.name.clone(),
            icon: if folder { "📁" } else { icon_for(&file.mime_type) },
            href: format!(
                "{}/{}",
                folder_href(alias),
                utf8_percent_encode(&file.name, PATH)
            ),
            size: if folder {
                "-".to_string()
            } else {
                format_size(file.size_bytes().unwrap_or(0))
            },
            modified: format_date(file.modified_time.as_deref().unwrap_or_default()),
            preview: PREVIEWABLE
                .contains(&file.mime_type.as_str())
                .then(|| format!("https://drive.google.com/file/d/{}/preview", file.id)),
        }
    }
}

pub fn folder_href(alias: &str) -> String {
    format!("/folder/{}", utf8_percent_encode(alias, SEGMENT))
}

fn page_href(alias: &str, page: u32) -> String {
    format!("{}/page/{page}", folder_href(alias))
}

fn icon_for(mime_type: &str) -> &'static str {
    match mime_type {
        "application/x-iso9660-image" => "💿",
        "application/zip" | "application/x-rar-compressed" | "application/x-7z-compressed" => "📦",
        "image/jpeg" | "image/png" | "image/gif" => "🖼️",
        "video/mp4" | "video/x-matroska" => "🎥",
        "audio/mpeg" => "🎵",
        "text/plain" => "📝",
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "📘",
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "📊",
        "application/vnd.ms-powerpoint"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "📽️",
        _ => "📄",
    }
}

/// 1024-based size with at most two decimals, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

/// `HH:MM DD/MM/YYYY` in UTC; unparseable input renders empty.
pub fn format_date(rfc3339: &str) -> String {
    DateTime::parse_from_rfc3339(rfc3339)
        .map(|date| date.naive_utc().format("%H:%M %d/%m/%Y").to_string())
        .unwrap_or_default()
}

pub fn render_listing(view: &ListingView) -> String {
    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css" rel="stylesheet">
</head>
<body>
<div class="container py-4">
<h1 class="h3 mb-4 pb-3 border-bottom text-primary">📂 {title}</h1>
"#,
        title = text(&view.title)
    );

    if !view.folders.is_empty() {
        html.push_str("<nav class=\"d-flex flex-wrap gap-2 mb-4\">\n");
        for folder in &view.folders {
            let class = if folder.current {
                "btn-primary"
            } else {
                "btn-outline-secondary"
            };
            let _ = writeln!(
                html,
                r#"<a href="{}" class="btn {class} btn-sm" title="{}">{}</a>"#,
                attr(&folder.href),
                attr(&folder.folder_id),
                text(&folder.alias)
            );
        }
        html.push_str("</nav>\n");
    }

    html.push_str(
        "<div class=\"table-responsive\">\n<table class=\"table table-hover table-bordered\">\n\
         <thead class=\"table-light\"><tr><th>Name</th><th>Size</th><th>Modified</th><th></th></tr></thead>\n<tbody>\n",
    );
    for row in &view.rows {
        let href = attr(&row.href);
        let _ = write!(
            html,
            r#"<tr>
<td>{icon} <a href="{href}">{name}</a></td>
<td class="text-nowrap">{size}</td>
<td class="text-nowrap">{modified}</td>
<td class="text-end"><a href="{href}" class="btn btn-outline-primary btn-sm" download>Download</a>"#,
            name = text(&row.name),
            icon = row.icon,
            size = text(&row.size),
            modified = text(&row.modified),
        );
        if let Some(preview) = &row.preview {
            let _ = write!(
                html,
                r#" <a href="{}" class="btn btn-outline-info btn-sm" target="_blank" rel="noopener">Preview</a>"#,
                attr(preview)
            );
        }
        html.push_str("</td>\n</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n</div>\n");

    if let Some(pagination) = &view.pagination {
        html.push_str("<nav aria-label=\"Pagination\"><ul class=\"pagination justify-content-center\">\n");
        push_page_link(&mut html, "« Previous", pagination.previous.as_deref());
        let _ = writeln!(
            html,
            r#"<li class="page-item active"><span class="page-link">Page {}</span></li>"#,
            pagination.current
        );
        push_page_link(&mut html, "Next »", pagination.next.as_deref());
        html.push_str("</ul></nav>\n");
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn push_page_link(html: &mut String, label: &str, href: Option<&str>) {
    let _ = match href {
        Some(href) => writeln!(
            html,
            r#"<li class="page-item"><a class="page-link" href="{}">{label}</a></li>"#,
            attr(href)
        ),
        None => writeln!(
            html,
            r#"<li class="page-item disabled"><span class="page-link">{label}</span></li>"#
        ),
    };
}
