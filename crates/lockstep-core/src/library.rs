use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "mkv"];

/// Resolves operator file selections against the configured media directory
/// and produces viewer-facing player URLs. The coordination core treats the
/// resolved path as an opaque stream identifier.
pub struct VideoLibrary {
    root: Option<PathBuf>,
    public_url: String,
}

impl VideoLibrary {
    pub fn new(root: Option<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root,
            public_url: public_url.into(),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Recursively list playable files under the media root, as
    /// forward-slash relative paths in sorted order so indexes are stable
    /// across calls.
    pub fn scan(&self) -> Result<Vec<String>, CoreError> {
        let root = self.root.as_deref().ok_or(CoreError::LibraryUnavailable)?;
        let mut files = Vec::new();
        collect_videos(root, "", &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Resolve a 1-based file number from the listing.
    pub fn resolve(&self, index: usize) -> Result<String, CoreError> {
        let files = self.scan()?;
        if index == 0 || index > files.len() {
            return Err(CoreError::BadIndex(index));
        }
        Ok(files[index - 1].clone())
    }

    /// Viewer-facing URL for the player page with the selected file.
    pub fn player_url(&self, file: &str) -> String {
        format!(
            "{}/player?video={}",
            self.public_url.trim_end_matches('/'),
            urlencoding::encode(file)
        )
    }
}

fn collect_videos(dir: &Path, prefix: &str, files: &mut Vec<String>) -> Result<(), CoreError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            collect_videos(&path, &format!("{prefix}{name}/"), files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        {
            files.push(format!("{prefix}{name}"));
        }
    }
    Ok(())
}
