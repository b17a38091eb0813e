//! Thumbnail storage injected into the viewer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

pub trait ThumbnailCache {
    fn get(&mut self, path: &Path) -> Option<Arc<RgbaImage>>;
    fn put(&mut self, path: PathBuf, thumb: Arc<RgbaImage>);
    /// Presence check that leaves the recency order alone.
    fn contains(&self, path: &Path) -> bool;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Least-recently-used cache bounded by entry count.
#[derive(Debug)]
pub struct LruThumbnailCache {
    capacity: usize,
    entries: HashMap<PathBuf, Arc<RgbaImage>>,
    order: VecDeque<PathBuf>,
}

impl LruThumbnailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&mut self, path: &Path) {
        if let Some(pos) = self.order.iter().position(|p| p == path) {
            if let Some(p) = self.order.remove(pos) {
                self.order.push_back(p);
            }
        }
    }
}

impl ThumbnailCache for LruThumbnailCache {
    fn get(&mut self, path: &Path) -> Option<Arc<RgbaImage>> {
        let thumb = self.entries.get(path).cloned()?;
        self.touch(path);
        Some(thumb)
    }

    fn put(&mut self, path: PathBuf, thumb: Arc<RgbaImage>) {
        if self.entries.insert(path.clone(), thumb).is_some() {
            self.touch(&path);
            return;
        }
        self.order.push_back(path);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Thumbnails that were asked for and have not arrived yet.
///
/// A path whose thumbnail could not be made never arrives, so it stays
/// pending and is not asked for again.
#[derive(Debug, Default)]
pub struct PendingThumbnails {
    pending: HashSet<PathBuf>,
}

impl PendingThumbnails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths in `wanted` that are neither cached nor pending. They are
    /// pending once returned.
    pub fn claim(&mut self, wanted: &[PathBuf], cache: &dyn ThumbnailCache) -> Vec<PathBuf> {
        wanted
            .iter()
            .filter(|path| !cache.contains(path))
            .filter(|path| self.pending.insert((*path).clone()))
            .cloned()
            .collect()
    }

    pub fn arrived(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumb() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(1, 1))
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruThumbnailCache::new(2);
        cache.put("a".into(), thumb());
        cache.put("b".into(), thumb());
        assert!(cache.get(Path::new("a")).is_some());
        cache.put("c".into(), thumb());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Path::new("b")).is_none());
        assert!(cache.get(Path::new("a")).is_some());
        assert!(cache.get(Path::new("c")).is_some());
    }

    #[test]
    fn reinsert_does_not_grow() {
        let mut cache = LruThumbnailCache::new(2);
        cache.put("a".into(), thumb());
        cache.put("a".into(), thumb());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicted_thumbnails_are_claimed_again() {
        let catalogue: Vec<PathBuf> = ["a", "b", "c", "d"].map(PathBuf::from).to_vec();
        let mut cache = LruThumbnailCache::new(2);
        let mut pending = PendingThumbnails::new();

        assert_eq!(pending.claim(&catalogue, &cache), catalogue);
        assert!(pending.claim(&catalogue, &cache).is_empty());
        for path in &catalogue {
            pending.arrived(path);
            cache.put(path.clone(), thumb());
        }
        assert!(pending.is_empty());
        assert!(!cache.contains(Path::new("a")));

        // Scrolling back to the start finds the first two evicted.
        let top = &catalogue[..2];
        assert_eq!(pending.claim(top, &cache), top.to_vec());
        assert!(pending.claim(top, &cache).is_empty());
        assert!(pending.claim(&catalogue[2..], &cache).is_empty());
    }

    #[test]
    fn contains_does_not_refresh_recency() {
        let mut cache = LruThumbnailCache::new(2);
        cache.put("a".into(), thumb());
        cache.put("b".into(), thumb());
        assert!(cache.contains(Path::new("a")));
        cache.put("c".into(), thumb());
        assert!(!cache.contains(Path::new("a")));
        assert!(cache.contains(Path::new("b")));
    }
}
