//! Recursive discovery of candidate documents.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use tracing::{debug, warn};

/// Find every file under `root` whose extension matches `extension`,
/// ignoring case. Subdirectories are searched recursively.
///
/// Paths come back sorted. Nothing found is an empty list, not an error.
pub fn locate_documents(root: &Path, extension: &str) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/**/*.{}",
        Pattern::escape(&root.to_string_lossy()),
        Pattern::escape(extension.trim_start_matches('.'))
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let paths = match glob_with(&pattern, options) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Invalid document pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut documents: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable path {}: {}", e.path().display(), e.error());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();

    documents.sort();
    debug!("Found {} candidate documents under {}", documents.len(), root.display());

    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_finds_nested_documents_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("lote/2024")).unwrap();
        fs::write(root.join("a.xml"), "<a/>").unwrap();
        fs::write(root.join("lote/b.XML"), "<b/>").unwrap();
        fs::write(root.join("lote/2024/c.Xml"), "<c/>").unwrap();
        fs::write(root.join("lote/readme.txt"), "hi").unwrap();
        fs::write(root.join("lote/xml"), "no extension").unwrap();

        let found = locate_documents(root, "xml");

        let mut expected = vec![
            root.join("a.xml"),
            root.join("lote/b.XML"),
            root.join("lote/2024/c.Xml"),
        ];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_ignores_directories_named_like_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("folder.xml")).unwrap();

        assert!(locate_documents(dir.path(), "xml").is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        assert!(locate_documents(dir.path(), ".xml").is_empty());
    }
}
