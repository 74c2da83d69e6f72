//! Where docrag stores its own data (config, vector store).
//!
//! Source documents stay where they are. We only store app state here.

use std::path::PathBuf;

/// Returns the directory where docrag stores config, the vector store, and other app data.
/// On macOS: `~/Library/Application Support/docrag/`; on Linux: `~/.local/share/docrag/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "docrag", "docrag")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default vector store directory: `store/` under [app_data_dir].
pub fn default_store_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("store"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_dir_lives_under_app_data() {
        let (Some(data), Some(store)) = (app_data_dir(), default_store_dir()) else {
            return;
        };
        assert_eq!(store.parent(), Some(data.as_path()));
    }
}
