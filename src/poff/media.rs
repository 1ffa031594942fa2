//! Extension-based media classification, MIME lookup (`mime_guess` plus legacy
//! overrides) and link-file URL extraction.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Pdf,
    Text,
    Link,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Pdf => "pdf",
            MediaKind::Text => "text",
            MediaKind::Link => "link",
            MediaKind::Other => "other",
        }
    }
}

const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "tif", "tiff", "heic"];
const VIDEO_EXTS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv", "m4v", "mts"];
const AUDIO_EXTS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac"];
const LINK_EXTS: &[&str] = &["webloc", "url", "desktop"];
const TEXT_EXTS: &[&str] = &["txt", "md", "csv", "json", "log", "ini", "yml", "yaml", "xml", "html", "htm", "css", "js"];

/// Mappings the legacy tree relies on where `mime_guess` answers differently or not at all.
const MIME_OVERRIDES: &[(&str, &str)] = &[
    ("heic", "image/heic"),
    ("mts", "video/MP2T"),
    ("m4v", "video/x-m4v"),
    ("m4a", "audio/mp4"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("aac", "audio/aac"),
    ("md", "text/markdown"),
    ("log", "text/plain"),
    ("ini", "text/plain"),
    ("yml", "text/yaml"),
    ("yaml", "text/yaml"),
    ("xml", "application/xml"),
    ("js", "application/javascript"),
];

static WEBLOC_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<key>URL</key>\s*<string>([^<]+)</string>").expect("static regex"));
static INI_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mi)^URL=(.+)$").expect("static regex"));

/// Lowercased extension of `name`; dotfiles like `.env` have none.
fn extension(name: &str) -> String {
    Path::new(name).extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default()
}

pub fn classify(name: &str) -> MediaKind {
    let ext = extension(name);
    let ext = ext.as_str();
    if IMAGE_EXTS.contains(&ext) {
        MediaKind::Image
    } else if VIDEO_EXTS.contains(&ext) {
        MediaKind::Video
    } else if AUDIO_EXTS.contains(&ext) {
        MediaKind::Audio
    } else if LINK_EXTS.contains(&ext) {
        MediaKind::Link
    } else if TEXT_EXTS.contains(&ext) {
        MediaKind::Text
    } else if ext == "pdf" {
        MediaKind::Pdf
    } else {
        MediaKind::Other
    }
}

/// MIME type by extension: legacy overrides first, then `mime_guess`.
pub fn detect_mime_type(name: &str) -> Option<&'static str> {
    let ext = extension(name);
    if ext.is_empty() {
        return None;
    }
    MIME_OVERRIDES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
        .or_else(|| mime_guess::from_ext(&ext).first_raw())
}

/// Target URL of a `.webloc`, `.url` or `.desktop` shortcut.
pub fn extract_link_url(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let ext = extension(&name);
    let bytes = fs::read(path).ok()?;
    if bytes.is_empty() {
        return None;
    }
    let content = String::from_utf8_lossy(&bytes);
    let re = match ext.as_str() {
        "webloc" => &*WEBLOC_URL,
        "url" | "desktop" => &*INI_URL,
        _ => return None,
    };
    let url = re.captures(&content)?.get(1)?.as_str().trim();
    if url.is_empty() { None } else { Some(url.to_string()) }
}
