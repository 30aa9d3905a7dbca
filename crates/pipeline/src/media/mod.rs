pub mod ffmpeg;

pub use ffmpeg::FfmpegCompositor;

use anyhow::Result;
use async_trait::async_trait;
use engine::{GapFill, MusicWindow, OverlaySchedule};
use std::path::{Path, PathBuf};

/// Compositing collaborator. The assembler hands over segment paths plus
/// derived timing metadata; everything behind this trait is an opaque
/// external effect.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn probe_duration(&self, media: &Path) -> Result<f64>;

    /// Combine a silent clip with its narration; the result runs exactly
    /// as long as the narration (freeze or reverse fill, trim otherwise).
    async fn combine_clip_with_narration(
        &self,
        clip: &Path,
        narration: &Path,
        output: &Path,
        gap_fill: GapFill,
    ) -> Result<PathBuf>;

    /// Concatenate same-codec clips without reencoding.
    async fn concat_clips(&self, clips: &[PathBuf], output: &Path) -> Result<PathBuf>;

    /// Concatenate finished segments with fade crossfades.
    async fn concat_with_fades(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf>;

    /// Concatenate narration lines with a fixed silence gap between them.
    async fn concat_audio_with_silence(
        &self,
        inputs: &[PathBuf],
        gap_seconds: f64,
        output: &Path,
    ) -> Result<PathBuf>;

    async fn mix_music(
        &self,
        video: &Path,
        windows: &[MusicWindow],
        output: &Path,
    ) -> Result<PathBuf>;

    async fn blit_overlay(
        &self,
        main: &Path,
        overlay: &Path,
        schedule: &OverlaySchedule,
        overlay_duration: f64,
        main_duration: f64,
        output: &Path,
    ) -> Result<PathBuf>;

    async fn burn_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<PathBuf>;
}
