use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{EventSink, Thumbnail, ViewerEvent};
use crate::processing::layout;
use crate::processing::resample::{CropBox, Quality, resample};
use crate::tasks::loader::decode_image;

/// Decode `path` and shrink it to fit a `size` x `size` tile.
pub fn make_thumbnail(path: &Path, size: u32) -> Result<RgbaImage> {
    let loaded = decode_image(path)?;
    let (w, h) = loaded.image.dimensions();
    let scale = layout::contain_scale(size, size, w, h).min(1.0);
    let (tw, th) = layout::scaled_size(w, h, scale);
    if (tw, th) == (w, h) {
        return Ok(Arc::unwrap_or_clone(loaded.image));
    }
    let crop = CropBox {
        left: 0.0,
        top: 0.0,
        width: f64::from(w),
        height: f64::from(h),
    };
    resample(&loaded.image, crop, tw, th, Quality::Display)
}

fn make_batch(paths: Vec<PathBuf>, size: u32) -> Vec<Thumbnail> {
    paths
        .into_iter()
        .filter_map(|path| match make_thumbnail(&path, size) {
            Ok(img) => Some(Thumbnail {
                path,
                image: Arc::new(img),
            }),
            Err(err) => {
                debug!(path = %path.display(), error = ?err, "thumbnail skipped");
                None
            }
        })
        .collect()
}

/// Generate thumbnails for `paths` in batches, one event per batch.
pub fn spawn_batches<S: EventSink>(
    paths: Vec<PathBuf>,
    size: u32,
    batch_size: usize,
    sink: S,
    cancel: CancellationToken,
) {
    if paths.is_empty() {
        return;
    }
    tokio::spawn(async move {
        let total = paths.len();
        for chunk in paths.chunks(batch_size.max(1)) {
            if cancel.is_cancelled() {
                debug!("thumbnail generation cancelled");
                return;
            }
            let chunk = chunk.to_vec();
            let Ok(batch) = tokio::task::spawn_blocking(move || make_batch(chunk, size)).await
            else {
                continue;
            };
            if !sink.deliver(ViewerEvent::ThumbnailsReady(batch)) {
                return;
            }
        }
        info!(total, "thumbnails generated");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, image::Rgba([9, 9, 9, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn thumbnail_fits_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "wide.png", 400, 100);
        let thumb = make_thumbnail(&path, 150).unwrap();
        assert_eq!(thumb.dimensions(), (150, 38));
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "tiny.png", 20, 10);
        assert_eq!(make_thumbnail(&path, 150).unwrap().dimensions(), (20, 10));
    }

    #[tokio::test]
    async fn batches_arrive_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..5)
            .map(|i| write_png(dir.path(), &format!("{i}.png"), 32, 32))
            .collect();
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_batches(paths, 16, 2, tx, CancellationToken::new());
        let mut sizes = Vec::new();
        while let Some(ViewerEvent::ThumbnailsReady(batch)) = rx.recv().await {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }
}
