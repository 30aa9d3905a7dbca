use super::Compositor;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use engine::render::{
    audio_concat_args, crossfade_concat_args, music_mix_args, overlay_blit_args,
    scene_segment_args, RenderCommand,
};
use engine::{reconcile_durations, GapFill, MusicWindow, OverlaySchedule};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const TARGET_WIDTH: u32 = 1920;
const TARGET_HEIGHT: u32 = 1080;
const FADE_SECONDS: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

/// Compositor backed by the ffmpeg/ffprobe binaries.
pub struct FfmpegCompositor;

impl FfmpegCompositor {
    async fn run_ffmpeg(&self, command: RenderCommand) -> Result<PathBuf> {
        if let Some(parent) = command.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("ffmpeg {}", command.ffmpeg_args.join(" "));
        let output = Command::new("ffmpeg")
            .args(&command.ffmpeg_args)
            .output()
            .await
            .context("failed to execute ffmpeg, make sure FFmpeg is installed")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg failed: {stderr}");
        }
        Ok(command.output_path)
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn probe_duration(&self, media: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(media)
            .output()
            .await
            .context("failed to execute ffprobe, make sure FFmpeg is installed")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffprobe failed for {}: {stderr}", media.display());
        }

        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).context("failed to parse ffprobe output")?;
        probe
            .format
            .and_then(|format| format.duration)
            .and_then(|duration| duration.parse::<f64>().ok())
            .with_context(|| format!("no duration reported for {}", media.display()))
    }

    async fn combine_clip_with_narration(
        &self,
        clip: &Path,
        narration: &Path,
        output: &Path,
        gap_fill: GapFill,
    ) -> Result<PathBuf> {
        let clip_duration = self.probe_duration(clip).await?;
        let narration_duration = self.probe_duration(narration).await?;
        let timing = reconcile_durations(clip_duration, narration_duration);
        debug!(
            "segment timing for {}: clip {clip_duration:.2}s, narration {narration_duration:.2}s, tail {:.2}s",
            output.display(),
            timing.freeze_tail
        );
        let command = scene_segment_args(
            clip,
            narration,
            output,
            &timing,
            gap_fill,
            TARGET_WIDTH,
            TARGET_HEIGHT,
        );
        self.run_ffmpeg(command).await
    }

    async fn concat_clips(&self, clips: &[PathBuf], output: &Path) -> Result<PathBuf> {
        // Concat demuxer: same-codec inputs, no reencoding.
        let list_path = output.with_extension("concat.txt");
        let mut list = String::new();
        for clip in clips {
            list.push_str(&format!("file '{}'\n", clip.display()));
        }
        tokio::fs::write(&list_path, list).await?;

        let command = RenderCommand {
            ffmpeg_args: vec![
                "-f".to_string(),
                "concat".to_string(),
                "-safe".to_string(),
                "0".to_string(),
                "-i".to_string(),
                list_path.to_string_lossy().to_string(),
                "-c".to_string(),
                "copy".to_string(),
                "-y".to_string(),
                output.to_string_lossy().to_string(),
            ],
            output_path: output.to_path_buf(),
        };
        let result = self.run_ffmpeg(command).await;
        tokio::fs::remove_file(&list_path).await.ok();
        result
    }

    async fn concat_with_fades(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let mut durations = Vec::with_capacity(segments.len());
        for segment in segments {
            durations.push(self.probe_duration(segment).await?);
        }
        let command = crossfade_concat_args(segments, &durations, FADE_SECONDS, output);
        self.run_ffmpeg(command).await
    }

    async fn concat_audio_with_silence(
        &self,
        inputs: &[PathBuf],
        gap_seconds: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        let command = audio_concat_args(inputs, gap_seconds, output);
        self.run_ffmpeg(command).await
    }

    async fn mix_music(
        &self,
        video: &Path,
        windows: &[MusicWindow],
        output: &Path,
    ) -> Result<PathBuf> {
        let command = music_mix_args(video, windows, 1.0, output);
        self.run_ffmpeg(command).await
    }

    async fn blit_overlay(
        &self,
        main: &Path,
        overlay: &Path,
        schedule: &OverlaySchedule,
        overlay_duration: f64,
        main_duration: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        let command = overlay_blit_args(
            main,
            overlay,
            schedule,
            overlay_duration,
            main_duration,
            output,
        );
        self.run_ffmpeg(command).await
    }

    async fn burn_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<PathBuf> {
        let command = RenderCommand {
            ffmpeg_args: vec![
                "-i".to_string(),
                video.to_string_lossy().to_string(),
                "-vf".to_string(),
                format!("ass={}", subtitles.display()),
                "-c:a".to_string(),
                "copy".to_string(),
                "-y".to_string(),
                output.to_string_lossy().to_string(),
            ],
            output_path: output.to_path_buf(),
        };
        self.run_ffmpeg(command).await
    }
}
