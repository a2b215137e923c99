//! Concatenation of shot clips into one sequence video.
//!
//! Every clip is scaled to fit inside the target frame, centered and padded
//! with black bars, then concatenated with FFmpeg's concat filter.

use std::path::{Path, PathBuf};

use seqgen_models::VideoSize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Fixed frame size of stitched sequences.
pub const STITCH_TARGET: VideoSize = VideoSize::new(1024, 1792);

/// File name of the stitched output inside a sequence directory.
pub const STITCHED_FILENAME: &str = "stitched_sequence.mp4";

/// Frame rate every clip is normalised to before concatenation.
const OUTPUT_FPS: u32 = 30;

/// Letterboxing concatenator.
#[derive(Debug, Clone)]
pub struct Stitcher {
    target: VideoSize,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Default for Stitcher {
    fn default() -> Self {
        Self {
            target: STITCH_TARGET,
            timeout_secs: None,
            cancel_rx: None,
        }
    }
}

impl Stitcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: VideoSize) -> Self {
        self.target = target;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn target(&self) -> VideoSize {
        self.target
    }

    /// Stitch `clips` in order into `output`.
    ///
    /// Missing clips are skipped; an empty remainder fails with
    /// [`MediaError::NoClips`].
    pub async fn stitch(&self, clips: &[PathBuf], output: &Path) -> MediaResult<PathBuf> {
        let existing: Vec<&PathBuf> = clips
            .iter()
            .filter(|p| {
                let found = p.exists();
                if !found {
                    warn!("Skipping missing clip {}", p.display());
                }
                found
            })
            .collect();

        if existing.is_empty() {
            return Err(MediaError::NoClips);
        }

        let mut with_audio = true;
        for clip in &existing {
            if !probe_video(clip).await?.has_audio {
                with_audio = false;
            }
        }

        let cmd = build_stitch_command(&existing, output, self.target, with_audio);

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner.run(&cmd).await?;

        info!(
            "Stitched {} clips into {} ({})",
            existing.len(),
            output.display(),
            self.target
        );
        Ok(output.to_path_buf())
    }
}

/// Build the filter graph for `count` inputs.
fn letterbox_filter(count: usize, target: VideoSize, with_audio: bool) -> String {
    let (w, h) = (target.width, target.height);
    let mut graph = String::new();
    let mut concat_inputs = String::new();

    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1,fps={OUTPUT_FPS}[v{i}];"
        ));
        concat_inputs.push_str(&format!("[v{i}]"));
        if with_audio {
            graph.push_str(&format!(
                "[{i}:a]aformat=sample_rates=44100:channel_layouts=stereo[a{i}];"
            ));
            concat_inputs.push_str(&format!("[a{i}]"));
        }
    }

    let audio_streams = if with_audio { 1 } else { 0 };
    graph.push_str(&format!(
        "{concat_inputs}concat=n={count}:v=1:a={audio_streams}[outv]"
    ));
    if with_audio {
        graph.push_str("[outa]");
    }
    graph
}

fn build_stitch_command<P: AsRef<Path>>(
    clips: &[P],
    output: &Path,
    target: VideoSize,
    with_audio: bool,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(output)
        .inputs(clips)
        .filter_complex(letterbox_filter(clips.len(), target, with_audio))
        .map("[outv]");

    if with_audio {
        cmd = cmd.map("[outa]").audio_codec("aac");
    }

    cmd.video_codec("libx264")
        .preset("medium")
        .crf(20)
        .pix_fmt("yuv420p")
        .faststart()
}
