use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::events::{EventSink, LoadedImage, ViewerEvent};
use crate::processing::transform::apply_exif_orientation;

/// Decode `path` to RGBA8, remembering whether the source had alpha, and
/// apply its EXIF orientation when present.
pub fn decode_image(path: &Path) -> Result<LoadedImage> {
    let img = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    let has_alpha = img.color().has_alpha();
    let orientation = read_orientation(path).unwrap_or(1);
    let rgba = apply_exif_orientation(img.to_rgba8(), orientation);
    debug!(
        path = %path.display(),
        width = rgba.width(),
        height = rgba.height(),
        has_alpha,
        orientation,
        "decoded image"
    );
    Ok(LoadedImage {
        path: path.to_path_buf(),
        image: Arc::new(rgba),
        has_alpha,
    })
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).map(|o| o as u16)
}

/// Decode on the blocking pool and post the outcome to the UI thread.
///
/// `request` lets the viewer ignore loads that a later navigation superseded.
pub fn spawn_load<S: EventSink>(request: u64, path: PathBuf, sink: S) {
    tokio::spawn(async move {
        let event = load_event(request, path).await;
        if !sink.deliver(event) {
            debug!(request, "viewer gone before load finished");
        }
    });
}

async fn load_event(request: u64, path: PathBuf) -> ViewerEvent {
    let target = path.clone();
    match tokio::task::spawn_blocking(move || decode_image(&target)).await {
        Ok(Ok(image)) => ViewerEvent::ImageLoaded { request, image },
        Ok(Err(err)) => {
            warn!(error = ?err, "image load failed");
            ViewerEvent::LoadFailed { request, path }
        }
        Err(err) => {
            warn!(error = %err, path = %path.display(), "decode task panicked");
            ViewerEvent::LoadFailed { request, path }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use tokio::sync::mpsc;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let loaded = decode_image(&path).unwrap();
        assert_eq!(loaded.image.dimensions(), (1, 2));
        assert!(!loaded.has_alpha);
    }

    #[test]
    fn png_with_alpha_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        image::RgbaImage::from_pixel(4, 3, image::Rgba([0, 0, 0, 10]))
            .save(&path)
            .unwrap();
        let loaded = decode_image(&path).unwrap();
        assert!(loaded.has_alpha);
        assert_eq!(loaded.image.dimensions(), (4, 3));
    }

    #[tokio::test]
    async fn failed_load_reports_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        spawn_load(7, missing.clone(), tx);
        match rx.recv().await.unwrap() {
            ViewerEvent::LoadFailed { request, path } => {
                assert_eq!(request, 7);
                assert_eq!(path, missing);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
