//! End-to-end pipeline tests: recipes are built from prompts, managers
//! reconcile ledgers against them with fake generators, and the assembler
//! composes the result through a fake compositor.

use anyhow::Result;
use async_trait::async_trait;
use engine::{GapFill, MusicWindow, OverlaySchedule};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use pipeline::assembler::VideoAssembler;
use pipeline::builder::{
    BackgroundMusicRecipeBuilder, ImageRecipeBuilder, NarratorRecipeBuilder, SubVideoRecipeBuilder,
};
use pipeline::generators::{
    ClipGenerator, GeneratorSet, MusicGenerator, SpeechGenerator, StillImageGenerator,
};
use pipeline::ledger::{AssetLedger, BackgroundMusicAsset, NarratorAsset, SubVideoAsset};
use pipeline::manager::{
    BackgroundMusicAssetManager, NarratorAndImageAssetManager, SubVideoAssetManager,
};
use pipeline::media::Compositor;
use pipeline::paths::ChapterPaths;
use pipeline::recipe::image::AspectRatio;
use pipeline::recipe::{ClipRecipe, ImageRecipe, MusicRecipe, NarratorRecipe};
use pipeline::script::TemplateScriptGenerator;

/// Generators that write a placeholder file and count invocations. File
/// sizes double as durations for the fake compositor (one byte = one
/// second).
#[derive(Default)]
struct CountingGenerators {
    speech_calls: AtomicUsize,
    image_calls: AtomicUsize,
    music_calls: AtomicUsize,
    clip_calls: AtomicUsize,
}

struct CountingSpeech(Arc<CountingGenerators>);
struct CountingImage(Arc<CountingGenerators>);
struct CountingMusic(Arc<CountingGenerators>);
struct CountingClip(Arc<CountingGenerators>);

fn write_artifact(output: &Path, extension: &str, bytes: usize) -> Result<PathBuf> {
    let target = output.with_extension(extension);
    std::fs::write(&target, vec![0u8; bytes])?;
    Ok(target)
}

#[async_trait]
impl SpeechGenerator for CountingSpeech {
    async fn clone_text_to_speech(
        &self,
        _recipe: &NarratorRecipe,
        output: &Path,
    ) -> Result<PathBuf> {
        self.0.speech_calls.fetch_add(1, Ordering::SeqCst);
        // Three-byte files read as three-second narrations downstream.
        write_artifact(output, "mp3", 3)
    }
}

#[async_trait]
impl StillImageGenerator for CountingImage {
    async fn text_to_image(&self, _recipe: &ImageRecipe, output: &Path) -> Result<PathBuf> {
        self.0.image_calls.fetch_add(1, Ordering::SeqCst);
        write_artifact(output, "png", 1)
    }
}

#[async_trait]
impl MusicGenerator for CountingMusic {
    async fn text_to_music(&self, _recipe: &MusicRecipe, output: &Path) -> Result<PathBuf> {
        self.0.music_calls.fetch_add(1, Ordering::SeqCst);
        write_artifact(output, "mp3", 30)
    }
}

#[async_trait]
impl ClipGenerator for CountingClip {
    async fn generate_clip(&self, _recipe: &ClipRecipe, output: &Path) -> Result<PathBuf> {
        self.0.clip_calls.fetch_add(1, Ordering::SeqCst);
        write_artifact(output, "mp4", 5)
    }
}

fn generator_set(counters: Arc<CountingGenerators>) -> Arc<GeneratorSet> {
    Arc::new(GeneratorSet {
        zonos_tts: Arc::new(CountingSpeech(counters.clone())),
        flux_image: Arc::new(CountingImage(counters.clone())),
        music_gen: Arc::new(CountingMusic(counters.clone())),
        wan_video: Arc::new(CountingClip(counters)),
    })
}

/// Compositor that treats file size as duration and records the music
/// windows it was asked to mix.
#[derive(Default)]
struct FakeCompositor {
    mixed_windows: Mutex<Vec<MusicWindow>>,
}

fn file_seconds(path: &Path) -> Result<f64> {
    Ok(std::fs::metadata(path)?.len() as f64)
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn probe_duration(&self, media: &Path) -> Result<f64> {
        file_seconds(media)
    }

    async fn combine_clip_with_narration(
        &self,
        _clip: &Path,
        narration: &Path,
        output: &Path,
        _gap_fill: GapFill,
    ) -> Result<PathBuf> {
        // The narration track is authoritative for segment duration.
        let seconds = file_seconds(narration)?;
        std::fs::write(output, vec![0u8; seconds as usize])?;
        Ok(output.to_path_buf())
    }

    async fn concat_clips(&self, clips: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let total: f64 = clips.iter().map(|c| file_seconds(c).unwrap_or(0.0)).sum();
        std::fs::write(output, vec![0u8; total as usize])?;
        Ok(output.to_path_buf())
    }

    async fn concat_with_fades(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let total: f64 = segments
            .iter()
            .map(|s| file_seconds(s).unwrap_or(0.0))
            .sum();
        std::fs::write(output, vec![0u8; total as usize])?;
        Ok(output.to_path_buf())
    }

    async fn concat_audio_with_silence(
        &self,
        inputs: &[PathBuf],
        gap_seconds: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        let voiced: f64 = inputs.iter().map(|i| file_seconds(i).unwrap_or(0.0)).sum();
        let total = voiced + gap_seconds * inputs.len().saturating_sub(1) as f64;
        std::fs::write(output, vec![0u8; total as usize])?;
        Ok(output.to_path_buf())
    }

    async fn mix_music(
        &self,
        video: &Path,
        windows: &[MusicWindow],
        output: &Path,
    ) -> Result<PathBuf> {
        self.mixed_windows.lock().unwrap().extend_from_slice(windows);
        std::fs::copy(video, output)?;
        Ok(output.to_path_buf())
    }

    async fn blit_overlay(
        &self,
        main: &Path,
        _overlay: &Path,
        _schedule: &OverlaySchedule,
        _overlay_duration: f64,
        _main_duration: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        std::fs::copy(main, output)?;
        Ok(output.to_path_buf())
    }

    async fn burn_subtitles(
        &self,
        video: &Path,
        _subtitles: &Path,
        output: &Path,
    ) -> Result<PathBuf> {
        std::fs::copy(video, output)?;
        Ok(output.to_path_buf())
    }
}

fn write_prompts(paths: &ChapterPaths, moods: &[&str]) {
    let prompts: Vec<serde_json::Value> = moods
        .iter()
        .enumerate()
        .map(|(i, mood)| {
            serde_json::json!({
                "narrator": format!("Narration line {}", i + 1),
                "visual_description": format!("Scene {}", i + 1),
                "visual_prompt": format!("visual prompt {}", i + 1),
                "scene_time_period": "day",
                "mood": mood,
            })
        })
        .collect();
    std::fs::create_dir_all(paths.chapter_prompt_path.parent().unwrap()).unwrap();
    std::fs::write(
        &paths.chapter_prompt_path,
        serde_json::to_string_pretty(&serde_json::json!({ "prompts": prompts })).unwrap(),
    )
    .unwrap();
}

fn setup(moods: &[&str]) -> (TempDir, Arc<ChapterPaths>) {
    let dir = TempDir::new().unwrap();
    let defaults = dir.path().join("shared_defaults");
    std::fs::create_dir_all(defaults.join("voices")).unwrap();
    std::fs::write(defaults.join("voices/voice_002.mp3"), b"voice").unwrap();

    let paths = Arc::new(ChapterPaths::new(dir.path(), "test_story", 0, &defaults).unwrap());
    write_prompts(&paths, moods);
    (dir, paths)
}

#[tokio::test]
async fn full_pipeline_fills_all_scenes_then_regenerates_only_deleted_one() {
    let (_dir, paths) = setup(&["relax", "relax", "action"]);
    NarratorRecipeBuilder::new(paths.clone()).build().unwrap();
    ImageRecipeBuilder::new(paths.clone(), AspectRatio::Landscape)
        .build()
        .unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager =
        NarratorAndImageAssetManager::new(paths.clone(), generator_set(counters.clone())).unwrap();
    assert_eq!(manager.narrator_assets.len(), 3);
    assert_eq!(manager.narrator_assets.missing_indices(), vec![0, 1, 2]);

    manager.generate_assets().await.unwrap();

    assert_eq!(counters.speech_calls.load(Ordering::SeqCst), 3);
    assert_eq!(counters.image_calls.load(Ordering::SeqCst), 3);
    assert!(manager.narrator_assets.is_complete());
    assert!(manager.image_assets.is_complete());

    // Delete scene 2's narration out-of-band; only that scene regenerates,
    // through a fresh manager as a new process would see it.
    let scene2 = manager
        .narrator_assets
        .get(1)
        .unwrap()
        .path()
        .unwrap()
        .to_path_buf();
    std::fs::remove_file(&scene2).unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager =
        NarratorAndImageAssetManager::new(paths.clone(), generator_set(counters.clone())).unwrap();
    assert_eq!(manager.narrator_assets.missing_indices(), vec![1]);

    manager.generate_assets().await.unwrap();

    assert_eq!(counters.speech_calls.load(Ordering::SeqCst), 1);
    assert_eq!(counters.image_calls.load(Ordering::SeqCst), 0);
    assert!(manager.narrator_assets.is_complete());
}

#[tokio::test]
async fn rerunning_a_complete_pipeline_calls_no_generators() {
    let (_dir, paths) = setup(&["relax", "action"]);
    NarratorRecipeBuilder::new(paths.clone()).build().unwrap();
    ImageRecipeBuilder::new(paths.clone(), AspectRatio::Landscape)
        .build()
        .unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager =
        NarratorAndImageAssetManager::new(paths.clone(), generator_set(counters.clone())).unwrap();
    manager.generate_assets().await.unwrap();
    let first_run = std::fs::read_to_string(&paths.narrator_asset_file).unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager =
        NarratorAndImageAssetManager::new(paths.clone(), generator_set(counters.clone())).unwrap();
    manager.generate_assets().await.unwrap();

    assert_eq!(counters.speech_calls.load(Ordering::SeqCst), 0);
    assert_eq!(counters.image_calls.load(Ordering::SeqCst), 0);
    assert!(manager.narrator_assets.missing_indices().is_empty());
    // The persisted ledger is unchanged by the second run.
    let second_run = std::fs::read_to_string(&paths.narrator_asset_file).unwrap();
    assert_eq!(first_run, second_run);
}

#[tokio::test]
async fn reprompted_chapter_discards_and_rebuilds_drifted_recipes() {
    let (_dir, paths) = setup(&["relax", "action"]);
    NarratorRecipeBuilder::new(paths.clone()).build().unwrap();

    // The chapter gets re-prompted with an extra scene; the stale store
    // must be discarded wholesale, not patched.
    write_prompts(&paths, &["relax", "action", "sci-fi"]);
    NarratorRecipeBuilder::new(paths.clone()).build().unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let manager =
        NarratorAndImageAssetManager::new(paths.clone(), generator_set(counters)).unwrap();
    assert_eq!(manager.narrator_recipe.len(), 3);
    assert_eq!(manager.narrator_assets.len(), 3);
    let text = std::fs::read_to_string(&paths.narrator_recipe_file).unwrap();
    assert!(text.contains("Narration line 3"));
}

#[tokio::test]
async fn consecutive_equal_music_recipes_share_one_generated_track() {
    let (_dir, paths) = setup(&["relax", "relax", "action"]);
    BackgroundMusicRecipeBuilder::new(paths.clone())
        .build()
        .unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager =
        BackgroundMusicAssetManager::new(paths.clone(), generator_set(counters.clone())).unwrap();
    manager.generate_assets().await.unwrap();

    assert_eq!(counters.music_calls.load(Ordering::SeqCst), 2);
    assert!(manager.assets.is_complete());
    let first = manager.assets.get(0).unwrap().asset.clone().unwrap();
    let second = manager.assets.get(1).unwrap().asset.clone().unwrap();
    let third = manager.assets.get(2).unwrap().asset.clone().unwrap();
    assert_eq!(first, second);
    assert_ne!(first, third);
}

#[tokio::test]
async fn sub_video_recipes_and_assets_build_from_upstream_families() {
    let (_dir, paths) = setup(&["relax", "action"]);
    NarratorRecipeBuilder::new(paths.clone()).build().unwrap();
    ImageRecipeBuilder::new(paths.clone(), AspectRatio::Landscape)
        .build()
        .unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager =
        NarratorAndImageAssetManager::new(paths.clone(), generator_set(counters.clone())).unwrap();
    manager.generate_assets().await.unwrap();

    let compositor = Arc::new(FakeCompositor::default());
    let builder = SubVideoRecipeBuilder::new(
        paths.clone(),
        compositor.clone(),
        Arc::new(TemplateScriptGenerator),
    );
    builder.build(AspectRatio::Landscape).await.unwrap();

    let counters = Arc::new(CountingGenerators::default());
    let mut manager = SubVideoAssetManager::new(
        paths.clone(),
        generator_set(counters.clone()),
        compositor.clone(),
    )
    .unwrap();
    assert_eq!(manager.recipe.len(), 2);
    // Short narrations still get the minimum clip count.
    assert_eq!(manager.recipe.get(0).unwrap().clips.len(), 3);
    assert!(matches!(
        manager.recipe.get(0).unwrap().clips[0],
        ClipRecipe::WanI2v { .. }
    ));

    manager.generate_assets().await.unwrap();

    assert_eq!(counters.clip_calls.load(Ordering::SeqCst), 6);
    assert!(manager.assets.is_complete());
}

fn fill_ledgers_for_assembly(paths: &Arc<ChapterPaths>, narration_seconds: &[usize]) {
    let mut narrator: AssetLedger<NarratorAsset> = AssetLedger::load(
        paths.clone(),
        paths.narrator_asset_file.clone(),
        "narrator",
    )
    .unwrap();
    let mut sub_video: AssetLedger<SubVideoAsset> = AssetLedger::load(
        paths.clone(),
        paths.sub_video_asset_file.clone(),
        "sub_video",
    )
    .unwrap();
    narrator.synchronize_size_to(narration_seconds.len());
    sub_video.synchronize_size_to(narration_seconds.len());

    for (i, seconds) in narration_seconds.iter().enumerate() {
        let narration = paths
            .narrator_asset_folder
            .join(format!("narration_{i}.mp3"));
        std::fs::write(&narration, vec![0u8; *seconds]).unwrap();
        narrator.set(i, NarratorAsset::new(narration)).unwrap();

        let clip = paths.sub_video_asset_folder.join(format!("clip_{i}.mp4"));
        std::fs::write(&clip, vec![0u8; 4]).unwrap();
        sub_video.set(i, SubVideoAsset::new(clip)).unwrap();
    }
    narrator.save().unwrap();
    sub_video.save().unwrap();
}

fn fill_music_ledger(paths: &Arc<ChapterPaths>, tracks: &[&str]) {
    let mut music: AssetLedger<BackgroundMusicAsset> = AssetLedger::load(
        paths.clone(),
        paths.background_music_asset_file.clone(),
        "background_music",
    )
    .unwrap();
    music.synchronize_size_to(tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        let file = paths.background_music_asset_folder.join(track);
        if !file.exists() {
            std::fs::write(&file, vec![0u8; 30]).unwrap();
        }
        music.set(i, BackgroundMusicAsset::new(file)).unwrap();
    }
    music.save().unwrap();
}

#[tokio::test]
async fn assembly_derives_merged_music_windows_and_writes_the_chapter_output() {
    let (_dir, paths) = setup(&["relax", "relax", "action"]);
    fill_ledgers_for_assembly(&paths, &[2, 3, 2]);
    fill_music_ledger(&paths, &["a.mp3", "a.mp3", "b.mp3"]);

    let compositor = Arc::new(FakeCompositor::default());
    let counters = Arc::new(CountingGenerators::default());
    let mut assembler = VideoAssembler::new(
        paths.clone(),
        compositor.clone(),
        Arc::new(CountingSpeech(counters)),
        None,
        GapFill::FreezeLastFrame,
    )
    .unwrap();

    let output = assembler.assemble().await.unwrap();

    assert_eq!(output, paths.video_output_file);
    assert!(output.is_file());
    // Scenes 1-2 share track a, scene 3 plays track b: two windows.
    let windows = compositor.mixed_windows.lock().unwrap().clone();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].start_time, 0.0);
    assert_eq!(windows[0].duration, 5.0);
    assert_eq!(windows[1].start_time, 5.0);
    assert_eq!(windows[1].duration, 2.0);
    // Temp files are cleaned up after assembly.
    assert!(!paths.assembler_asset_folder.join("temp_files").exists());
}

#[tokio::test]
async fn assembly_refuses_when_music_ledger_is_behind() {
    let (_dir, paths) = setup(&["relax", "action"]);
    fill_ledgers_for_assembly(&paths, &[2, 2]);
    // No music ledger at all.

    let counters = Arc::new(CountingGenerators::default());
    let result = VideoAssembler::new(
        paths,
        Arc::new(FakeCompositor::default()),
        Arc::new(CountingSpeech(counters)),
        None,
        GapFill::FreezeLastFrame,
    );

    let err = result.err().expect("assembler must refuse");
    assert!(err.to_string().contains("background_music"));
}
