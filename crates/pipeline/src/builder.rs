use crate::ledger::{AssetLedger, ImageAsset, NarratorAsset};
use crate::media::Compositor;
use crate::paths::ChapterPaths;
use crate::prompt::ScenePrompt;
use crate::recipe::image::AspectRatio;
use crate::recipe::{
    AssemblerRecipeStore, ClipRecipe, ImageRecipe, MusicRecipe, NarratorRecipe, RecipeEntry,
    RecipeStore, SubVideoRecipe,
};
use crate::script::{elaborate_all, SceneScriptGenerator};
use anyhow::{bail, Result};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const MIN_CLIPS_PER_SCENE: usize = 3;
const MAX_CLIPS_PER_SCENE: usize = 8;
const DEFAULT_CLIP_SECONDS: f64 = 5.0;
const SCRIPT_WORKERS: usize = 4;

fn fresh_seed() -> i64 {
    rand::thread_rng().gen_range(0..=i32::MAX as i64)
}

fn load_prompts(paths: &ChapterPaths) -> Result<Vec<ScenePrompt>> {
    let prompts = ScenePrompt::load_from_json(&paths.chapter_prompt_path);
    if prompts.is_empty() {
        bail!(
            "no scene prompts found at {}",
            paths.chapter_prompt_path.display()
        );
    }
    Ok(prompts)
}

/// Discard a store whose length no longer tracks the prompt count. Drift
/// means the chapter was re-prompted; stale recipes must not survive.
fn rebuild_if_drifted<R: RecipeEntry>(
    store: &mut RecipeStore<R>,
    prompt_count: usize,
    family: &str,
) -> Result<bool> {
    if store.is_consistent_with(prompt_count) {
        info!("{family} recipe already consistent with {prompt_count} prompts");
        return Ok(false);
    }
    if !store.is_empty() {
        warn!(
            "{family} recipe has {} entries but the chapter has {prompt_count} prompts - rebuilding",
            store.len()
        );
        store.clear()?;
    }
    Ok(true)
}

pub struct NarratorRecipeBuilder {
    paths: Arc<ChapterPaths>,
    clone_voice_path: PathBuf,
}

impl NarratorRecipeBuilder {
    pub fn new(paths: Arc<ChapterPaths>) -> Self {
        let clone_voice_path = paths
            .default_assets_folder()
            .join("voices")
            .join("voice_002.mp3");
        NarratorRecipeBuilder {
            paths,
            clone_voice_path,
        }
    }

    pub fn build(&self) -> Result<()> {
        let prompts = load_prompts(&self.paths)?;
        let mut store: RecipeStore<NarratorRecipe> =
            RecipeStore::load(self.paths.clone(), self.paths.narrator_recipe_file.clone())?;
        if !rebuild_if_drifted(&mut store, prompts.len(), "narrator")? {
            return Ok(());
        }

        let clone_voice_path = self.clone_voice_path.clone();
        for prompt in &prompts {
            store.append(NarratorRecipe::ZonosTts {
                prompt: prompt.narrator.clone(),
                seed: fresh_seed(),
                clone_voice_path: clone_voice_path.clone(),
            })?;
        }
        info!("built {} narrator recipes", store.len());
        Ok(())
    }
}

pub struct ImageRecipeBuilder {
    paths: Arc<ChapterPaths>,
    aspect_ratio: AspectRatio,
}

impl ImageRecipeBuilder {
    pub fn new(paths: Arc<ChapterPaths>, aspect_ratio: AspectRatio) -> Self {
        ImageRecipeBuilder {
            paths,
            aspect_ratio,
        }
    }

    pub fn build(&self) -> Result<()> {
        let prompts = load_prompts(&self.paths)?;
        let mut store: RecipeStore<ImageRecipe> =
            RecipeStore::load(self.paths.clone(), self.paths.image_recipe_file.clone())?;
        if !rebuild_if_drifted(&mut store, prompts.len(), "image")? {
            return Ok(());
        }

        let (width, height) = self.aspect_ratio.dimensions();
        for prompt in &prompts {
            store.append(ImageRecipe::Flux {
                prompt: prompt.visual_prompt.clone(),
                seed: fresh_seed(),
                width,
                height,
            })?;
        }
        info!("built {} image recipes", store.len());
        Ok(())
    }
}

pub struct BackgroundMusicRecipeBuilder {
    paths: Arc<ChapterPaths>,
}

impl BackgroundMusicRecipeBuilder {
    pub fn new(paths: Arc<ChapterPaths>) -> Self {
        BackgroundMusicRecipeBuilder { paths }
    }

    pub fn build(&self) -> Result<()> {
        let prompts = load_prompts(&self.paths)?;
        let mut store: RecipeStore<MusicRecipe> = RecipeStore::load(
            self.paths.clone(),
            self.paths.background_music_recipe_file.clone(),
        )?;
        if !rebuild_if_drifted(&mut store, prompts.len(), "background music")? {
            return Ok(());
        }

        // Consecutive scenes with the same mood get value-equal entries so
        // the manager's reuse rule fires instead of regenerating.
        let mut previous: Option<(String, MusicRecipe)> = None;
        for prompt in &prompts {
            let entry = match &previous {
                Some((mood, entry)) if *mood == prompt.mood => entry.clone(),
                _ => MusicRecipe::MusicGen {
                    prompt: music_prompt_for_mood(&prompt.mood),
                    mood: prompt.mood.clone(),
                    seed: fresh_seed(),
                },
            };
            previous = Some((prompt.mood.clone(), entry.clone()));
            store.append(entry)?;
        }
        info!("built {} background music recipes", store.len());
        Ok(())
    }
}

/// Underscore prompts per mood; unknown moods fall through verbatim so a
/// hand-written prompt in the mood field still works.
fn music_prompt_for_mood(mood: &str) -> String {
    match mood {
        "relax" => "Calm documentary underscore, warm string drone with gentle plucked \
                    accents, soft percussion heartbeat, loop-friendly, no vocals, no lead melody."
            .to_string(),
        "action" => "Tense pursuit underscore, muted percussion pulses over a low string \
                     drone, staccato rhythm, restrained dynamics, loop-friendly, no vocals."
            .to_string(),
        "sci-fi" => "Atmospheric science fiction underscore, analog pads with granular \
                     shimmer and a steady sub-pulse, wide gentle ambience, no vocals, no hook."
            .to_string(),
        other => other.to_string(),
    }
}

pub struct SubVideoRecipeBuilder {
    paths: Arc<ChapterPaths>,
    compositor: Arc<dyn Compositor>,
    script_generator: Arc<dyn SceneScriptGenerator>,
}

impl SubVideoRecipeBuilder {
    pub fn new(
        paths: Arc<ChapterPaths>,
        compositor: Arc<dyn Compositor>,
        script_generator: Arc<dyn SceneScriptGenerator>,
    ) -> Self {
        SubVideoRecipeBuilder {
            paths,
            compositor,
            script_generator,
        }
    }

    /// Sub-clips per scene, sized so each clip covers roughly five seconds
    /// of narration.
    fn clip_count_for(&self, narration_duration: f64) -> usize {
        let wanted = (narration_duration / DEFAULT_CLIP_SECONDS).ceil() as usize;
        wanted.clamp(MIN_CLIPS_PER_SCENE, MAX_CLIPS_PER_SCENE)
    }

    pub async fn build(&self, aspect_ratio: AspectRatio) -> Result<()> {
        let prompts = load_prompts(&self.paths)?;

        let narrator_assets: AssetLedger<NarratorAsset> = AssetLedger::load(
            self.paths.clone(),
            self.paths.narrator_asset_file.clone(),
            "narrator",
        )?;
        narrator_assets.ensure_complete()?;
        let image_assets: AssetLedger<ImageAsset> = AssetLedger::load(
            self.paths.clone(),
            self.paths.image_asset_file.clone(),
            "image",
        )?;
        image_assets.ensure_complete()?;

        let mut store: RecipeStore<SubVideoRecipe> =
            RecipeStore::load(self.paths.clone(), self.paths.sub_video_recipe_file.clone())?;
        if !rebuild_if_drifted(&mut store, prompts.len(), "sub-video")? {
            return Ok(());
        }

        let mut subdivisions = Vec::with_capacity(prompts.len());
        for scene_index in 0..prompts.len() {
            let narration = narrator_assets
                .get(scene_index)
                .and_then(|record| record.path().map(PathBuf::from));
            let duration = match narration {
                Some(path) => self.compositor.probe_duration(&path).await?,
                None => DEFAULT_CLIP_SECONDS * MIN_CLIPS_PER_SCENE as f64,
            };
            subdivisions.push(self.clip_count_for(duration));
        }

        let scripts = elaborate_all(
            self.script_generator.clone(),
            &prompts,
            &subdivisions,
            SCRIPT_WORKERS,
        )
        .await?;

        let (width, height) = aspect_ratio.dimensions();
        for (scene_index, lines) in scripts.iter().enumerate() {
            let scene_image = image_assets
                .get(scene_index)
                .and_then(|record| record.path().map(PathBuf::from));
            let mut clips = Vec::with_capacity(lines.len());
            for (line_index, line) in lines.iter().enumerate() {
                let clip = if line_index == 0 {
                    ClipRecipe::WanI2v {
                        prompt: line.clone(),
                        seed: fresh_seed(),
                        width,
                        height,
                        media_path: scene_image.clone(),
                    }
                } else {
                    ClipRecipe::WanT2v {
                        prompt: line.clone(),
                        seed: fresh_seed(),
                        width,
                        height,
                    }
                };
                clips.push(clip);
            }
            store.append(SubVideoRecipe { clips })?;
        }
        info!("built {} sub-video recipes", store.len());
        Ok(())
    }
}

/// Materialize the assembler options document with defaults when missing.
pub fn build_assembler_recipe(paths: Arc<ChapterPaths>) -> Result<()> {
    let store = AssemblerRecipeStore::load(paths)?;
    store.save()?;
    info!("assembler recipe document ready");
    Ok(())
}
