use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

const SUPPORTED: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!(dir = %dir.display(), count = images.len(), "listed images");
    Ok(images)
}

/// Ordered list of images with a cursor for single-view navigation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    paths: Vec<PathBuf>,
    current: Option<usize>,
}

impl Catalog {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let current = if paths.is_empty() { None } else { Some(0) };
        Self { paths, current }
    }

    /// Catalog for a CLI argument: a directory lists its images, a file
    /// lists its siblings and points at the file itself.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::new(list_images(path)?));
        }
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut catalog = Self::new(list_images(dir)?);
        if !catalog.select_path(path) {
            catalog.paths.insert(0, path.to_path_buf());
            catalog.current = Some(0);
        }
        Ok(catalog)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.and_then(|i| self.paths.get(i)).map(PathBuf::as_path)
    }

    pub fn select(&mut self, index: usize) -> Option<&Path> {
        if index >= self.paths.len() {
            return None;
        }
        self.current = Some(index);
        self.current()
    }

    pub fn select_path(&mut self, path: &Path) -> bool {
        let found = self
            .paths
            .iter()
            .position(|p| p == path || p.ends_with(path));
        if let Some(i) = found {
            self.current = Some(i);
        }
        found.is_some()
    }

    /// Step forward or back, wrapping around.
    pub fn step(&mut self, forward: bool) -> Option<&Path> {
        let len = self.paths.len();
        let cur = self.current?;
        let next = if forward {
            (cur + 1) % len
        } else {
            (cur + len - 1) % len
        };
        self.current = Some(next);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_supported_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.webp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();
        let names: Vec<_> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.webp"]);
    }

    #[test]
    fn step_wraps_both_ways() {
        let mut catalog = Catalog::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(catalog.step(false), Some(Path::new("c")));
        assert_eq!(catalog.step(true), Some(Path::new("a")));
        assert_eq!(catalog.step(true), Some(Path::new("b")));
    }

    #[test]
    fn empty_catalog_has_no_cursor() {
        let mut catalog = Catalog::new(Vec::new());
        assert_eq!(catalog.current(), None);
        assert_eq!(catalog.step(true), None);
    }
}
