pub mod remote;

use crate::recipe::{ClipRecipe, ImageRecipe, MusicRecipe, NarratorRecipe};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Uniform generator capability per asset family: take the recipe entry
/// and a target output path (without extension), produce the artifact,
/// return where it landed.
#[async_trait]
pub trait SpeechGenerator: Send + Sync {
    async fn clone_text_to_speech(
        &self,
        recipe: &NarratorRecipe,
        output: &Path,
    ) -> Result<PathBuf>;
}

#[async_trait]
pub trait StillImageGenerator: Send + Sync {
    async fn text_to_image(&self, recipe: &ImageRecipe, output: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn text_to_music(&self, recipe: &MusicRecipe, output: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait ClipGenerator: Send + Sync {
    async fn generate_clip(&self, recipe: &ClipRecipe, output: &Path) -> Result<PathBuf>;
}

/// Transcribes the finished video's audio into subtitles. Returns the
/// styled file used for burning plus the plain companion shipped next to
/// the final video.
#[async_trait]
pub trait SubtitleGenerator: Send + Sync {
    async fn generate_subtitles(
        &self,
        video: &Path,
        output_dir: &Path,
    ) -> Result<(PathBuf, PathBuf)>;
}

/// Interface table mapping each persisted `recipe_type` variant onto the
/// capability that produces it. Closed by construction: adding a recipe
/// variant forces a decision here.
pub struct GeneratorSet {
    pub zonos_tts: Arc<dyn SpeechGenerator>,
    pub flux_image: Arc<dyn StillImageGenerator>,
    pub music_gen: Arc<dyn MusicGenerator>,
    pub wan_video: Arc<dyn ClipGenerator>,
}

impl GeneratorSet {
    pub fn speech_for(&self, recipe: &NarratorRecipe) -> Arc<dyn SpeechGenerator> {
        match recipe {
            NarratorRecipe::ZonosTts { .. } => self.zonos_tts.clone(),
        }
    }

    pub fn image_for(&self, recipe: &ImageRecipe) -> Arc<dyn StillImageGenerator> {
        match recipe {
            ImageRecipe::Flux { .. } => self.flux_image.clone(),
        }
    }

    pub fn music_for(&self, recipe: &MusicRecipe) -> Arc<dyn MusicGenerator> {
        match recipe {
            MusicRecipe::MusicGen { .. } => self.music_gen.clone(),
        }
    }

    pub fn clip_for(&self, recipe: &ClipRecipe) -> Arc<dyn ClipGenerator> {
        match recipe {
            ClipRecipe::WanT2v { .. } | ClipRecipe::WanI2v { .. } => self.wan_video.clone(),
        }
    }
}
