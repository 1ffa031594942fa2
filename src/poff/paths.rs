use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{PoffError, PoffResult};
use super::{FILE_CONFIG_SUFFIX, FOLDER_CONFIG_NAME, WORKS_DIR_NAME};

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));
static NON_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

/// `<dir>/poff.config.json`
pub fn folder_config_path(dir: &Path) -> PathBuf {
    dir.join(FOLDER_CONFIG_NAME)
}

/// `<dir>/.works/<name>.config.json`
pub fn file_config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(WORKS_DIR_NAME).join(format!("{name}{FILE_CONFIG_SUFFIX}"))
}

/// Lowercase, collapse every run of non `[a-z0-9]` into `-`, trim dashes.
/// Empty results become `untitled`.
pub fn slugify(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() { "untitled".to_string() } else { slug.to_string() }
}

/// Directory-name sanitizer used by the create tool.
pub fn sanitize_name(name: &str) -> String {
    let clean = NON_NAME.replace_all(name.trim(), "-");
    let clean = clean.trim_matches('-');
    if clean.is_empty() { "untitled".to_string() } else { clean.to_string() }
}

/// What a request path resolved to inside the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Folder { dir: PathBuf },
    File { dir: PathBuf, name: String },
}

impl Target {
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Folder { .. } => "folder",
            Target::File { .. } => "file",
        }
    }

    /// Sidecar backing this target.
    pub fn config_path(&self) -> PathBuf {
        match self {
            Target::Folder { dir } => folder_config_path(dir),
            Target::File { dir, name } => file_config_path(dir, name),
        }
    }
}

/// Normalize a request path: backslashes become `/`, surrounding slashes trimmed.
pub fn normalize_request_path(raw: &str) -> String {
    raw.replace('\\', "/").trim_matches('/').to_string()
}

/// Split a normalized request path into segments, rejecting traversal and
/// anything that addresses sidecar storage directly.
pub fn validate_request_path(rel: &str) -> PoffResult<Vec<&str>> {
    if rel.contains('\u{0000}') {
        return Err(PoffError::InvalidPath("path cannot contain NUL characters".into()));
    }
    let mut segs = Vec::new();
    for seg in rel.split('/') {
        match seg {
            "" | "." => continue,
            ".." => return Err(PoffError::InvalidPath("'..' segments are not allowed".into())),
            WORKS_DIR_NAME | FOLDER_CONFIG_NAME => {
                return Err(PoffError::InvalidPath(format!("'{seg}' is reserved")))
            }
            s => segs.push(s),
        }
    }
    Ok(segs)
}

/// Component-wise containment; `/data/x` is not inside `/data2`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    if cfg!(windows) {
        let a = path.components().next();
        let b = root.components().next();
        if a != b {
            return false;
        }
    }
    path.starts_with(root)
}

/// Resolve `raw` (relative to `root`) to a folder or file inside the root.
/// Symlinks are followed; the resolved target must still lie inside the canonical root.
pub fn resolve_target(root: &Path, raw: &str) -> PoffResult<Target> {
    let rel = normalize_request_path(raw);
    let segs = validate_request_path(&rel)?;
    let root = fs::canonicalize(root).map_err(|_| PoffError::NotFound(root.display().to_string()))?;

    let mut joined = root.clone();
    for seg in &segs {
        joined.push(seg);
    }
    let canon = fs::canonicalize(&joined).map_err(|_| PoffError::NotFound(rel.clone()))?;
    if !is_within(&canon, &root) {
        return Err(PoffError::InvalidPath(format!("{rel} resolves outside the root")));
    }
    if canon.is_dir() {
        return Ok(Target::Folder { dir: canon });
    }

    let name = match segs.last() {
        Some(n) => n.to_string(),
        None => return Err(PoffError::InvalidPath(rel)),
    };
    let parent = joined.parent().unwrap_or(&root);
    let dir = fs::canonicalize(parent).map_err(|_| PoffError::NotFound(rel.clone()))?;
    if !is_within(&dir, &root) {
        return Err(PoffError::InvalidPath(format!("{rel} resolves outside the root")));
    }
    Ok(Target::File { dir, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_cases() {
        assert_eq!(slugify("My Folder!!"), "my-folder");
        assert_eq!(slugify("..."), "untitled");
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("Report 2024 (final).pdf"), "report-2024-final-pdf");
        assert_eq!(slugify("Café"), "caf");
    }

    #[test]
    fn sanitize_name_cases() {
        assert_eq!(sanitize_name("  my new/dir  "), "my-new-dir");
        assert_eq!(sanitize_name("v1.2_beta"), "v1.2_beta");
        assert_eq!(sanitize_name("///"), "untitled");
    }

    #[test]
    fn sidecar_locations() {
        let d = Path::new("/srv/site/docs");
        assert_eq!(folder_config_path(d), Path::new("/srv/site/docs/poff.config.json"));
        assert_eq!(file_config_path(d, "a.txt"), Path::new("/srv/site/docs/.works/a.txt.config.json"));
    }

    #[test]
    fn request_path_validation() {
        assert_eq!(normalize_request_path("\\docs\\a.txt/"), "docs/a.txt");
        assert_eq!(validate_request_path("docs//./a.txt").unwrap(), vec!["docs", "a.txt"]);
        assert!(validate_request_path("docs/../etc").is_err());
        assert!(validate_request_path("docs/.works/a.txt.config.json").is_err());
        assert!(validate_request_path("poff.config.json").is_err());
        assert!(validate_request_path("a\u{0000}b").is_err());
        assert!(validate_request_path("").unwrap().is_empty());
    }

    #[test]
    fn prefix_is_component_wise() {
        assert!(is_within(Path::new("/data/x"), Path::new("/data")));
        assert!(!is_within(Path::new("/data2/x"), Path::new("/data")));
    }

    #[test]
    fn resolve_inside_tempdir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("docs/a.txt"), b"hi").unwrap();

        let root = fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(resolve_target(tmp.path(), "").unwrap(), Target::Folder { dir: root.clone() });
        assert_eq!(resolve_target(tmp.path(), "/docs/").unwrap(), Target::Folder { dir: root.join("docs") });
        assert_eq!(
            resolve_target(tmp.path(), "docs\\a.txt").unwrap(),
            Target::File { dir: root.join("docs"), name: "a.txt".into() }
        );
        assert!(matches!(resolve_target(tmp.path(), "docs/missing"), Err(PoffError::NotFound(_))));
        assert!(matches!(resolve_target(tmp.path(), "../x"), Err(PoffError::InvalidPath(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("out")).unwrap();
        assert!(matches!(resolve_target(tmp.path(), "out"), Err(PoffError::InvalidPath(_))));
    }
}
