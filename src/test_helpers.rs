//! Shared fixtures for unit tests.
//!
//! ```rust,ignore
//! use crate::test_helpers::create_source_files;
//!
//! let tmp = TempDir::new().unwrap();
//! create_source_files(tmp.path(), &["chair.png", "notes.txt", "Finish/old.png"]);
//! ```

use std::fs;
use std::path::Path;

/// Create placeholder files under `root`, making parent folders as needed.
///
/// Contents are the relative path itself: enough for mock codecs, which never
/// decode pixels, and distinct per file so copies can be told apart.
pub fn create_source_files(root: &Path, names: &[&str]) {
    for name in names {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, name.as_bytes()).unwrap();
    }
}
