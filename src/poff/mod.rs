//! poff metadata core: sidecar model, directory scan and the reconcile algorithm.
//! HTTP concerns live in `crate::server`; everything here is plain blocking filesystem work.

pub mod error;
pub mod types;
pub mod json;
pub mod paths;
pub mod store;
pub mod scanner;
pub mod reconcile;
pub mod edit;
pub mod media;
pub mod worktype;
pub mod locks;

pub use error::{PoffError, PoffResult};
pub use types::{EntryKind, FileConfig, FolderConfig, TreeEntry};
pub use json::{content_hash, to_sidecar_string};
pub use paths::{folder_config_path, file_config_path, resolve_target, slugify, sanitize_name, Target};
pub use store::{load, load_raw, write};
pub use scanner::scan;
pub use reconcile::{ensure_folder_config, ensure_file_config, reconcile_folder, reconcile_file, generate_id, iso_now, Reconciled};
pub use edit::{SaveRequest, save_folder, save_file};
pub use media::{MediaKind, classify, detect_mime_type, extract_link_url};
pub use worktype::{WorktypeRegistry, merge_work};
pub use locks::PathLocks;

/// Folder sidecar file name.
pub const FOLDER_CONFIG_NAME: &str = "poff.config.json";
/// Hidden subfolder holding per-file sidecars.
pub const WORKS_DIR_NAME: &str = ".works";
/// Suffix appended to a file name for its sidecar inside `.works`.
pub const FILE_CONFIG_SUFFIX: &str = ".config.json";
