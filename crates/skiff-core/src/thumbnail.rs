//! Thumbnail capture
//!
//! Rotating, cropping and encoding a page snapshot is slow, so it runs on
//! the blocking pool. Only one capture is in flight at a time: a new one
//! supersedes the previous, which finishes before the new one starts and
//! whose result is dropped.

use image::{imageops, RgbaImage};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use skiff_tabs::TabId;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn square(size: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }
}

pub struct CaptureRequest {
    /// Page URL at capture time, used to match the result
    pub url: String,
    pub image: RgbaImage,
    pub crop: CropRect,
    pub tab_id: TabId,
    /// Clockwise rotation of the source, in degrees
    pub rotate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenCapture {
    pub tab_id: TabId,
    pub path: PathBuf,
    pub url: String,
}

pub fn thumbnail_path(cache_dir: &Path, tab_id: TabId) -> PathBuf {
    cache_dir.join(format!("tab-{}-thumb.png", tab_id))
}

/// Undo the source rotation, crop and write `<cache>/tab-<id>-thumb.png`.
pub fn save_to_file(cache_dir: &Path, request: CaptureRequest) -> Result<ScreenCapture> {
    let path = thumbnail_path(cache_dir, request.tab_id);
    let write_failed = |reason: String| CoreError::ThumbnailWriteFailed {
        path: path.clone(),
        reason,
    };

    let image = match (360 - request.rotate % 360) % 360 {
        // Snap to the nearest quarter turn
        a if (45..135).contains(&a) => imageops::rotate90(&request.image),
        a if (135..225).contains(&a) => imageops::rotate180(&request.image),
        a if (225..315).contains(&a) => imageops::rotate270(&request.image),
        _ => request.image,
    };

    let crop = request.crop;
    let x = crop.x.min(image.width());
    let y = crop.y.min(image.height());
    let width = crop.width.min(image.width() - x);
    let height = crop.height.min(image.height() - y);
    if width == 0 || height == 0 {
        return Err(write_failed("empty crop".to_string()));
    }
    let cropped = imageops::crop_imm(&image, x, y, width, height).to_image();

    std::fs::create_dir_all(cache_dir).map_err(|e| write_failed(e.to_string()))?;
    cropped
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| write_failed(e.to_string()))?;

    tracing::debug!(tab_id = request.tab_id, path = %path.display(), "Saved thumbnail");

    Ok(ScreenCapture {
        tab_id: request.tab_id,
        path,
        url: request.url,
    })
}

#[derive(Default)]
struct Completion {
    finished: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn finish(&self) {
        *self.finished.lock() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut finished = self.finished.lock();
        while !*finished {
            self.cond.wait(&mut finished);
        }
    }
}

struct Report {
    generation: u64,
    result: Result<ScreenCapture>,
}

struct InFlight {
    generation: u64,
    cancelled: Arc<AtomicBool>,
    completion: Arc<Completion>,
}

/// Reports and completes even if the save panics.
struct TaskGuard {
    generation: u64,
    results: mpsc::UnboundedSender<Report>,
    completion: Arc<Completion>,
    result: Option<Result<ScreenCapture>>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or(Err(CoreError::CaptureCancelled));
        let _ = self.results.send(Report {
            generation: self.generation,
            result,
        });
        self.completion.finish();
    }
}

pub struct ThumbnailCapturer {
    runtime: Handle,
    cache_dir: PathBuf,
    results_tx: mpsc::UnboundedSender<Report>,
    results_rx: mpsc::UnboundedReceiver<Report>,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl ThumbnailCapturer {
    pub fn new(runtime: Handle, cache_dir: PathBuf) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            cache_dir,
            results_tx,
            results_rx,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a capture, superseding the one in flight.
    pub fn start(&mut self, request: CaptureRequest) {
        let previous = self.in_flight.take().map(|f| {
            f.cancelled.store(true, Ordering::SeqCst);
            f.completion
        });

        self.generation += 1;
        let generation = self.generation;
        let cancelled = Arc::new(AtomicBool::new(false));
        let completion = Arc::new(Completion::default());

        let mut guard = TaskGuard {
            generation,
            results: self.results_tx.clone(),
            completion: Arc::clone(&completion),
            result: None,
        };
        let task_cancelled = Arc::clone(&cancelled);
        let cache_dir = self.cache_dir.clone();

        tracing::debug!(
            tab_id = request.tab_id,
            generation = generation,
            superseded = previous.is_some(),
            "Starting thumbnail capture"
        );

        self.runtime.spawn_blocking(move || {
            if let Some(previous) = previous {
                previous.wait();
            }
            if !task_cancelled.load(Ordering::SeqCst) {
                guard.result = Some(save_to_file(&cache_dir, request));
            }
        });

        self.in_flight = Some(InFlight {
            generation,
            cancelled,
            completion,
        });
    }

    /// Result of the current capture, if it has finished.
    pub fn try_next(&mut self) -> Option<Result<ScreenCapture>> {
        while let Ok(report) = self.results_rx.try_recv() {
            if let Some(result) = self.accept(report) {
                return Some(result);
            }
        }
        None
    }

    /// Wait for the current capture. `None` when nothing is in flight.
    pub async fn next(&mut self) -> Option<Result<ScreenCapture>> {
        while self.in_flight.is_some() {
            let report = self.results_rx.recv().await?;
            if let Some(result) = self.accept(report) {
                return Some(result);
            }
        }
        None
    }

    /// Cancel the capture in flight and block until its task is done.
    pub fn cancel_and_wait(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancelled.store(true, Ordering::SeqCst);
            in_flight.completion.wait();
            tracing::debug!(generation = in_flight.generation, "Thumbnail capture cancelled");
        }
        while self.results_rx.try_recv().is_ok() {}
    }

    fn accept(&mut self, report: Report) -> Option<Result<ScreenCapture>> {
        match &self.in_flight {
            Some(in_flight) if in_flight.generation == report.generation => {
                self.in_flight = None;
                Some(report.result)
            }
            _ => None,
        }
    }
}

impl Drop for ThumbnailCapturer {
    fn drop(&mut self) {
        self.cancel_and_wait();
    }
}
