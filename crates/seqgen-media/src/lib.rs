//! Local media collaborators for generated sequences.
//!
//! This crate provides:
//! - Crop-to-fill reference image resizing (JPEG output)
//! - FFmpeg command building with timeout and cancellation
//! - Letterboxed concatenation of shot clips into one sequence
//! - Best-effort removal of temporary uploads

pub mod cleanup;
pub mod command;
pub mod error;
pub mod probe;
pub mod resize;
pub mod stitch;

pub use cleanup::{remove_quietly, remove_upload};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use resize::{ImageResizer, JpegResizer, JPEG_QUALITY};
pub use stitch::{Stitcher, STITCHED_FILENAME, STITCH_TARGET};
