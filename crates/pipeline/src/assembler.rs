use crate::generators::{SpeechGenerator, SubtitleGenerator};
use crate::ledger::{
    AssemblerAssets, AssetLedger, BackgroundMusicAsset, NarratorAsset, SubVideoAsset,
};
use crate::media::Compositor;
use crate::paths::ChapterPaths;
use crate::recipe::{AssemblerRecipeStore, NarratorRecipe};
use anyhow::{Context, Result};
use engine::{
    derive_music_windows, ending_overlay_offset, schedule_overlay, GapFill, MusicCue,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Composes the per-scene artifacts into the chapter's final video:
/// scene segments, optional ending and intro, fade crossfades, background
/// music windows, the repeating overlay and subtitles.
///
/// Construction fails when any upstream ledger is incomplete; the error
/// names the blocking family.
pub struct VideoAssembler {
    paths: Arc<ChapterPaths>,
    compositor: Arc<dyn Compositor>,
    speech: Arc<dyn SpeechGenerator>,
    subtitles: Option<Arc<dyn SubtitleGenerator>>,
    recipe: AssemblerRecipeStore,
    assembler_assets: AssemblerAssets,
    narrator_assets: AssetLedger<NarratorAsset>,
    sub_video_assets: AssetLedger<SubVideoAsset>,
    music_assets: AssetLedger<BackgroundMusicAsset>,
    gap_fill: GapFill,
    temp_folder: PathBuf,
    temp_files: Vec<PathBuf>,
    pub subtitle_file: Option<PathBuf>,
}

impl VideoAssembler {
    pub fn new(
        paths: Arc<ChapterPaths>,
        compositor: Arc<dyn Compositor>,
        speech: Arc<dyn SpeechGenerator>,
        subtitles: Option<Arc<dyn SubtitleGenerator>>,
        gap_fill: GapFill,
    ) -> Result<Self> {
        let narrator_assets: AssetLedger<NarratorAsset> = AssetLedger::load(
            paths.clone(),
            paths.narrator_asset_file.clone(),
            "narrator",
        )?;
        narrator_assets.ensure_complete()?;

        let sub_video_assets: AssetLedger<SubVideoAsset> = AssetLedger::load(
            paths.clone(),
            paths.sub_video_asset_file.clone(),
            "sub_video",
        )?;
        sub_video_assets.ensure_complete()?;

        let music_assets: AssetLedger<BackgroundMusicAsset> = AssetLedger::load(
            paths.clone(),
            paths.background_music_asset_file.clone(),
            "background_music",
        )?;
        music_assets.ensure_complete()?;

        let recipe = AssemblerRecipeStore::load(paths.clone())?;
        let assembler_assets = AssemblerAssets::load(paths.clone())?;

        let temp_folder = paths.assembler_asset_folder.join("temp_files");
        std::fs::create_dir_all(&temp_folder)?;

        Ok(VideoAssembler {
            paths,
            compositor,
            speech,
            subtitles,
            recipe,
            assembler_assets,
            narrator_assets,
            sub_video_assets,
            music_assets,
            gap_fill,
            temp_folder,
            temp_files: Vec::new(),
            subtitle_file: None,
        })
    }

    pub async fn assemble(&mut self) -> Result<PathBuf> {
        info!("starting video assembly for {}", self.paths.chapter_tag());

        let (mut segments, mut cues) = self.build_scene_segments().await?;

        if !self.recipe.recipe.ending.skip {
            if let Some((ending, cue)) = self.build_ending_segment(&segments).await? {
                segments.push(ending);
                cues.push(cue);
            }
        }

        if !self.recipe.recipe.intro.skip {
            if let Some(intro) = self.intro_segment() {
                segments.insert(0, intro);
                cues.insert(0, MusicCue::silent());
            }
        }

        let composed = self.temp_path("composed", "mp4");
        let mut output = self
            .compositor
            .concat_with_fades(&segments, &composed)
            .await?;
        self.temp_files.push(output.clone());

        output = self.mix_background_music(output, &segments, &cues).await?;
        output = self.apply_repeating_overlay(output).await?;
        output = self.apply_subtitles(output).await?;

        let final_path = self.rename_outputs(&output)?;
        self.cleanup();
        info!("video assembly completed: {}", final_path.display());
        Ok(final_path)
    }

    fn temp_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.temp_folder
            .join(format!("{stem}_{}.{extension}", Uuid::new_v4().simple()))
    }

    /// One segment per scene, narration-long, in scene order; the parallel
    /// cue list mirrors the music ledger.
    async fn build_scene_segments(&mut self) -> Result<(Vec<PathBuf>, Vec<MusicCue>)> {
        let scene_count = self.sub_video_assets.len();
        let mut segments = Vec::with_capacity(scene_count);
        let mut cues = Vec::with_capacity(scene_count);

        for scene_index in 0..scene_count {
            let clip = self
                .sub_video_assets
                .get(scene_index)
                .and_then(|record| record.path().map(Path::to_path_buf))
                .with_context(|| format!("scene {} has no sub-video", scene_index + 1))?;
            let narration = self
                .narrator_assets
                .get(scene_index)
                .and_then(|record| record.path().map(Path::to_path_buf))
                .with_context(|| format!("scene {} has no narration", scene_index + 1))?;

            let segment_path = self.temp_folder.join(format!(
                "{}_segment_{:03}.mp4",
                self.paths.chapter_tag(),
                scene_index + 1
            ));
            let segment = self
                .compositor
                .combine_clip_with_narration(&clip, &narration, &segment_path, self.gap_fill)
                .await?;
            self.temp_files.push(segment.clone());
            segments.push(segment);

            let cue = self
                .music_assets
                .get(scene_index)
                .map(BackgroundMusicAsset::cue)
                .unwrap_or_else(MusicCue::silent);
            cues.push(cue);
        }

        info!("created {} scene segments", segments.len());
        Ok((segments, cues))
    }

    fn intro_segment(&self) -> Option<PathBuf> {
        let asset = self.recipe.recipe.intro.asset.clone()?;
        if !asset.is_file() {
            warn!("intro asset missing on disk: {}", asset.display());
            return None;
        }
        info!("prepending intro segment: {}", asset.display());
        Some(asset)
    }

    /// Synthesize the ending segment: concatenated narration lines over a
    /// designated sub-clip, with an optional overlay starting once the
    /// configured line is reached. The finished segment is persisted so
    /// reruns reuse it. The ending inherits the last scene's music cue.
    async fn build_ending_segment(
        &mut self,
        scene_segments: &[PathBuf],
    ) -> Result<Option<(PathBuf, MusicCue)>> {
        let ending_cue = self
            .music_assets
            .records()
            .last()
            .map(BackgroundMusicAsset::cue)
            .unwrap_or_else(MusicCue::silent);

        if let Some(existing) = self.assembler_assets.video_ending() {
            info!("reusing persisted ending segment: {}", existing.display());
            return Ok(Some((existing.to_path_buf(), ending_cue)));
        }

        let ending = self.recipe.recipe.ending.clone();
        if ending.narration_lines.is_empty() {
            info!("ending has no narration lines, skipping ending segment");
            return Ok(None);
        }

        let clone_voice_path = match &ending.clone_voice_path {
            Some(path) => path.clone(),
            None => {
                warn!("ending recipe has no clone voice, skipping ending segment");
                return Ok(None);
            }
        };

        // Synthesize each narration line separately; the overlay offset
        // depends on the individual line durations.
        let mut line_paths = Vec::with_capacity(ending.narration_lines.len());
        let mut line_durations = Vec::with_capacity(ending.narration_lines.len());
        for (line_index, line) in ending.narration_lines.iter().enumerate() {
            let recipe = NarratorRecipe::ZonosTts {
                prompt: line.clone(),
                seed: ending.seed,
                clone_voice_path: clone_voice_path.clone(),
            };
            let output = self.temp_path(&format!("ending_narrator_{}", line_index + 1), "mp3");
            let artifact = self.speech.clone_text_to_speech(&recipe, &output).await?;
            line_durations.push(self.compositor.probe_duration(&artifact).await?);
            self.temp_files.push(artifact.clone());
            line_paths.push(artifact);
        }

        let concatenated = self.temp_path("ending_narration", "mp3");
        let concatenated = self
            .compositor
            .concat_audio_with_silence(&line_paths, ending.silence_gap_seconds, &concatenated)
            .await?;
        self.temp_files.push(concatenated.clone());

        let ending_clip = match &ending.sub_video {
            Some(clip) if clip.is_file() => clip.clone(),
            _ => {
                let fallback = scene_segments
                    .first()
                    .context("no scene segments to borrow an ending clip from")?
                    .clone();
                warn!("ending clip unset, falling back to the first scene segment");
                self.recipe.set_ending_sub_video(&fallback)?;
                fallback
            }
        };

        let combined = self.temp_path("ending_combined", "mp4");
        let mut ending_segment = self
            .compositor
            .combine_clip_with_narration(&ending_clip, &concatenated, &combined, self.gap_fill)
            .await?;

        let final_ending = self.paths.assembler_asset_folder.join(format!(
            "{}_ending.mp4",
            self.paths.chapter_tag()
        ));

        if let Some(overlay_asset) = ending.overlay_asset.as_ref().filter(|p| p.is_file()) {
            let offset = ending_overlay_offset(
                &line_durations,
                ending.overlay_start_line.saturating_sub(1),
                ending.start_delay_seconds,
            );
            let segment_duration = self.compositor.probe_duration(&ending_segment).await?;
            let overlay_duration = self.compositor.probe_duration(overlay_asset).await?;
            let schedule =
                schedule_overlay(offset, -1.0, overlay_duration, segment_duration, true);
            self.temp_files.push(ending_segment.clone());
            ending_segment = self
                .compositor
                .blit_overlay(
                    &ending_segment,
                    overlay_asset,
                    &schedule,
                    overlay_duration,
                    segment_duration,
                    &final_ending,
                )
                .await?;
        } else {
            std::fs::rename(&ending_segment, &final_ending)
                .with_context(|| format!("failed to place ending at {}", final_ending.display()))?;
            ending_segment = final_ending;
        }

        self.assembler_assets
            .set_video_ending(ending_segment.clone())?;
        info!("created ending segment: {}", ending_segment.display());
        Ok(Some((ending_segment, ending_cue)))
    }

    /// Derive music windows from the final segment durations and mix them
    /// under the narration.
    async fn mix_background_music(
        &mut self,
        video: PathBuf,
        segments: &[PathBuf],
        cues: &[MusicCue],
    ) -> Result<PathBuf> {
        let mut durations = Vec::with_capacity(segments.len());
        for segment in segments {
            durations.push(self.compositor.probe_duration(segment).await?);
        }

        let windows = derive_music_windows(&durations, cues);
        if windows.is_empty() {
            info!("no background music windows, skipping music mix");
            return Ok(video);
        }

        let output = self.temp_path("with_music", "mp4");
        let mixed = self.compositor.mix_music(&video, &windows, &output).await?;
        self.temp_files.push(mixed.clone());
        info!("mixed {} background music window(s)", windows.len());
        Ok(mixed)
    }

    async fn apply_repeating_overlay(&mut self, video: PathBuf) -> Result<PathBuf> {
        let overlay = self.recipe.recipe.overlay.clone();
        if overlay.skip {
            return Ok(video);
        }
        let Some(asset) = overlay.asset.as_ref().filter(|p| p.is_file()) else {
            warn!("overlay enabled but its asset is missing, skipping");
            return Ok(video);
        };

        let main_duration = self.compositor.probe_duration(&video).await?;
        let overlay_duration = self.compositor.probe_duration(asset).await?;
        let schedule = schedule_overlay(
            overlay.start_time_seconds,
            overlay.interval_seconds,
            overlay_duration,
            main_duration,
            overlay.allow_extend,
        );
        if schedule.is_empty() {
            info!("no valid overlay start times, passing through");
            return Ok(video);
        }

        let output = self.temp_path("with_overlay", "mp4");
        let result = self
            .compositor
            .blit_overlay(
                &video,
                asset,
                &schedule,
                overlay_duration,
                main_duration,
                &output,
            )
            .await?;
        self.temp_files.push(result.clone());
        info!("applied overlay at {} start time(s)", schedule.starts.len());
        Ok(result)
    }

    async fn apply_subtitles(&mut self, video: PathBuf) -> Result<PathBuf> {
        let subtitles = self.recipe.recipe.subtitles.clone();
        if subtitles.skip {
            return Ok(video);
        }
        let Some(generator) = self.subtitles.clone() else {
            warn!("subtitles requested but no subtitle generator is wired in, skipping");
            return Ok(video);
        };

        let (ass_file, srt_file) = generator
            .generate_subtitles(&video, &self.temp_folder)
            .await?;
        self.temp_files.push(ass_file.clone());
        self.subtitle_file = Some(srt_file);

        if !subtitles.burn_into_video {
            return Ok(video);
        }
        let output = self.temp_path("subtitled", "mp4");
        let burned = self
            .compositor
            .burn_subtitles(&video, &ass_file, &output)
            .await?;
        self.temp_files.push(burned.clone());
        Ok(burned)
    }

    /// Move the finished video (and subtitle companion) onto the
    /// deterministic chapter output names.
    fn rename_outputs(&mut self, video: &Path) -> Result<PathBuf> {
        let target = self.paths.video_output_file.clone();
        std::fs::rename(video, &target)
            .with_context(|| format!("failed to place final video at {}", target.display()))?;
        self.temp_files.retain(|path| path != video);

        if let Some(subtitle) = self.subtitle_file.take() {
            let extension = subtitle
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "srt".to_string());
            let subtitle_target = target.with_extension(extension);
            std::fs::rename(&subtitle, &subtitle_target).with_context(|| {
                format!("failed to place subtitles at {}", subtitle_target.display())
            })?;
            self.subtitle_file = Some(subtitle_target);
        }
        Ok(target)
    }

    fn cleanup(&mut self) {
        info!("cleaning up {} temporary files", self.temp_files.len());
        for file in self.temp_files.drain(..) {
            if file.exists() {
                std::fs::remove_file(&file).ok();
            }
        }
        if let Ok(entries) = std::fs::read_dir(&self.temp_folder) {
            for entry in entries.flatten() {
                std::fs::remove_file(entry.path()).ok();
            }
        }
        std::fs::remove_dir(&self.temp_folder).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::generators::SpeechGenerator;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoopSpeech;

    #[async_trait]
    impl SpeechGenerator for NoopSpeech {
        async fn clone_text_to_speech(
            &self,
            _recipe: &NarratorRecipe,
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
    }

    struct NoopCompositor;

    #[async_trait]
    impl Compositor for NoopCompositor {
        async fn probe_duration(&self, _media: &Path) -> Result<f64> {
            Ok(1.0)
        }
        async fn combine_clip_with_narration(
            &self,
            _clip: &Path,
            _narration: &Path,
            output: &Path,
            _gap_fill: GapFill,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
        async fn concat_clips(&self, _clips: &[PathBuf], output: &Path) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
        async fn concat_with_fades(
            &self,
            _segments: &[PathBuf],
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
        async fn concat_audio_with_silence(
            &self,
            _inputs: &[PathBuf],
            _gap_seconds: f64,
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
        async fn mix_music(
            &self,
            _video: &Path,
            _windows: &[engine::MusicWindow],
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
        async fn blit_overlay(
            &self,
            _main: &Path,
            _overlay: &Path,
            _schedule: &engine::OverlaySchedule,
            _overlay_duration: f64,
            _main_duration: f64,
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
        async fn burn_subtitles(
            &self,
            _video: &Path,
            _subtitles: &Path,
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
    }

    #[test]
    fn refuses_to_start_on_incomplete_upstream_ledger() {
        let dir = TempDir::new().unwrap();
        let defaults = dir.path().join("shared_defaults");
        std::fs::create_dir_all(&defaults).unwrap();
        let paths =
            Arc::new(ChapterPaths::new(dir.path(), "story", 0, &defaults).unwrap());

        let result = VideoAssembler::new(
            paths,
            Arc::new(NoopCompositor),
            Arc::new(NoopSpeech),
            None,
            GapFill::FreezeLastFrame,
        );

        let err = result.err().expect("assembly must refuse to start");
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::IncompleteFamily { family, .. }) => {
                assert_eq!(*family, "narrator");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
