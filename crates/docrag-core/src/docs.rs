//! Discovering ingestible documents under a user-chosen directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::extract::is_supported;

/// Scans `root` for files [extract_text](crate::extract_text) can handle, in walk order.
/// A single supported file is returned as-is. Hidden entries are skipped and
/// symlinks into directories are not followed (walkdir default).
pub fn scan_documents(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if root.is_file() {
        return if is_supported(root) {
            Ok(vec![root.to_path_buf()])
        } else {
            Err(ScanError::Unsupported(root.to_path_buf()))
        };
    }
    if !root.is_dir() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    let mut docs = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry.map_err(|e| ScanError::Walk(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file() && is_supported(path) {
            docs.push(path.to_path_buf());
        }
    }
    Ok(docs)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("no such file or directory: {0}")]
    NotFound(PathBuf),
    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_supported_files_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), "x").unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::write(dir.path().join("c.docx"), "x").unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join(".cache/d.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("scans")).unwrap();
        std::fs::write(dir.path().join("scans/e.png"), "x").unwrap();

        let names: Vec<_> = scan_documents(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "b.pdf", "scans/e.png"]);
    }

    #[test]
    fn single_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.txt");
        std::fs::write(&path, "x").unwrap();
        assert_eq!(scan_documents(&path).unwrap(), vec![path]);
    }

    #[test]
    fn missing_root_is_error() {
        assert!(matches!(
            scan_documents(Path::new("/no/such/dir")),
            Err(ScanError::NotFound(_))
        ));
    }
}
