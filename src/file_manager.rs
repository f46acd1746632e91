use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes files below a root directory, creating parents as needed.
#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: &Path) -> Result<Self> {
        let base_dir = base_dir.to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create base directory: {:?}", base_dir))?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a slash-separated relative path onto the root.
    pub fn path_for(&self, relative: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty() && *s != "." && *s != "..") {
            path.push(segment);
        }
        path
    }

    pub fn save_file(&self, relative: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(relative);
        write_file(&path, content)?;
        Ok(path)
    }

    /// Pretty-printed JSON, two-space indented.
    pub fn save_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Failed to serialize {}", relative))?;
        self.save_file(relative, &json)
    }
}

/// Write `content` to `path`, creating its parent directory first.
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let mut file =
        fs::File::create(path).with_context(|| format!("Failed to create file: {:?}", path))?;
    file.write_all(content)
        .with_context(|| format!("Failed to write to file: {:?}", path))?;
    Ok(())
}

/// Relative location of a route's document inside the content root.
pub fn document_path(route: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        "index.json".to_string()
    } else {
        format!("{}/index.json", trimmed)
    }
}

pub const MANIFEST_FILE: &str = "routes.json";
