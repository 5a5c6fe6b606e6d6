//! Haar cascade object detection.
//!
//! Facade over the workspace crates: [`core`] for image kinds and the thread
//! pool, [`imgproc`] for integral images and window statistics, and
//! [`objdetect`] for loading, evaluating and scanning cascades.

pub use cv_core as core;
pub use cv_imgproc as imgproc;
pub use cv_objdetect as objdetect;

pub use cv_objdetect::{
    parse_cascade, Detection, EvaluationContext, HaarCascade, ObjdetectError, ScanParams,
};

/// Initialize a single global Rayon thread pool for the window scanner.
///
/// Call this once at application startup before scanning images.
/// Repeated calls are idempotent and return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `RUSTCV_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> cv_core::Result<()> {
    cv_core::init_global_thread_pool(num_threads)
}
