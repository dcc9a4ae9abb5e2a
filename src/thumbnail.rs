use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbaImage};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::errors::Result;

/// Edge length of the square grid thumbnails.
pub const THUMBNAIL_SIZE: u32 = 100;
/// Longest edge of the preview image.
pub const PREVIEW_SIZE: u32 = 800;

const CHUNK_SIZE: usize = 10;

fn decode(path: &Path) -> Result<DynamicImage> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// The largest square centered in `img`.
pub fn center_crop_square(img: &DynamicImage) -> DynamicImage {
    let side = img.width().min(img.height());
    let x = (img.width() - side) / 2;
    let y = (img.height() - side) / 2;
    img.crop_imm(x, y, side, side)
}

/// Square thumbnail filling `size`×`size`, cropping whatever does not fit.
pub fn make_thumbnail(path: &Path, size: u32) -> Result<RgbaImage> {
    let img = decode(path)?;
    let square = center_crop_square(&img);
    Ok(square.resize_exact(size, size, FilterType::Triangle).to_rgba8())
}

/// The whole image scaled down to fit in `max`×`max`. Smaller images are left alone.
pub fn load_preview(path: &Path, max: u32) -> Result<RgbaImage> {
    let img = decode(path)?;
    if img.width() <= max && img.height() <= max {
        return Ok(img.to_rgba8());
    }
    Ok(img.resize(max, max, FilterType::Triangle).to_rgba8())
}

pub enum ThumbnailMessage {
    Decoded {
        idx: usize,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    Failed {
        idx: usize,
        error: String,
    },
}

/// Decodes thumbnails off the UI thread. Dropping it stops any chunk that
/// has not started yet.
pub struct ThumbnailLoader {
    receiver: Receiver<ThumbnailMessage>,
    completed: Arc<Mutex<usize>>,
    total: usize,
    cancelled: Arc<AtomicBool>,
}

impl ThumbnailLoader {
    pub fn spawn(jobs: Vec<(usize, PathBuf)>, size: u32) -> Self {
        let (tx, rx) = channel::unbounded();
        let completed = Arc::new(Mutex::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));
        let total = jobs.len();

        let done = completed.clone();
        let stop = cancelled.clone();
        thread::spawn(move || {
            let started = std::time::Instant::now();
            for chunk in jobs.chunks(CHUNK_SIZE) {
                if stop.load(Ordering::Relaxed) {
                    log::debug!("Thumbnail loading cancelled");
                    return;
                }
                chunk.par_iter().for_each_with(tx.clone(), |tx, (idx, path)| {
                    let message = match make_thumbnail(path, size) {
                        Ok(rgba) => ThumbnailMessage::Decoded {
                            idx: *idx,
                            width: rgba.width(),
                            height: rgba.height(),
                            pixels: rgba.into_raw(),
                        },
                        Err(err) => {
                            log::warn!("Thumbnail failed for {}: {}", path.display(), err);
                            ThumbnailMessage::Failed {
                                idx: *idx,
                                error: err.to_string(),
                            }
                        }
                    };
                    // Count after sending so a finished loader has nothing left in flight.
                    let _ = tx.send(message);
                    *done.lock() += 1;
                });
            }
            log::info!("Decoded {} thumbnails in {:?}", jobs.len(), started.elapsed());
        });

        Self {
            receiver: rx,
            completed,
            total,
            cancelled,
        }
    }

    /// Messages that have arrived so far, without blocking.
    pub fn drain(&self) -> Vec<ThumbnailMessage> {
        self.receiver.try_iter().collect()
    }

    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        *self.completed.lock() as f32 / self.total as f32
    }

    pub fn is_finished(&self) -> bool {
        *self.completed.lock() >= self.total
    }
}

impl Drop for ThumbnailLoader {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageBuffer, Rgba};
    use std::time::{Duration, Instant};

    /// 40×20 image: left half red, right half blue, with a green 20×20 square in the middle.
    fn striped() -> DynamicImage {
        let buffer = ImageBuffer::from_fn(40, 20, |x, _| {
            if (10..30).contains(&x) {
                Rgba([0, 255, 0, 255])
            } else if x < 10 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        DynamicImage::ImageRgba8(buffer)
    }

    #[test]
    fn crop_keeps_the_center() {
        let cropped = center_crop_square(&striped()).to_rgba8();
        assert_eq!(cropped.dimensions(), (20, 20));
        assert!(cropped.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn crop_of_square_is_identity() {
        let img = DynamicImage::new_rgba8(16, 16);
        assert_eq!(center_crop_square(&img).dimensions(), (16, 16));
    }

    #[test]
    fn thumbnail_and_preview_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        striped().save(&path).unwrap();

        assert_eq!(make_thumbnail(&path, 8).unwrap().dimensions(), (8, 8));
        assert_eq!(load_preview(&path, 800).unwrap().dimensions(), (40, 20));
        assert_eq!(load_preview(&path, 10).unwrap().dimensions(), (10, 5));
    }

    #[test]
    fn loader_reports_every_job() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        striped().save(&good).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not a png").unwrap();

        let loader = ThumbnailLoader::spawn(vec![(0, good), (1, bad)], 4);

        let deadline = Instant::now() + Duration::from_secs(10);
        while !loader.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(loader.is_finished());
        assert_eq!(loader.progress(), 1.0);
        let messages = loader.drain();
        assert_eq!(messages.len(), 2);
        for message in messages {
            match message {
                ThumbnailMessage::Decoded { idx, width, height, pixels } => {
                    assert_eq!((idx, width, height), (0, 4, 4));
                    assert_eq!(pixels.len(), 4 * 4 * 4);
                }
                ThumbnailMessage::Failed { idx, .. } => assert_eq!(idx, 1),
            }
        }
    }
}
