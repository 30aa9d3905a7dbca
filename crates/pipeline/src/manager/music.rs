use crate::generators::GeneratorSet;
use crate::ledger::{AssetLedger, AssetRecord, BackgroundMusicAsset};
use crate::paths::ChapterPaths;
use crate::recipe::{MusicRecipe, RecipeStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Drives the background-music family. Moods repeat across consecutive
/// scenes constantly, so a scene whose recipe equals the previous scene's
/// reuses that track instead of invoking the generator again.
pub struct BackgroundMusicAssetManager {
    paths: Arc<ChapterPaths>,
    generators: Arc<GeneratorSet>,
    pub recipe: RecipeStore<MusicRecipe>,
    pub assets: AssetLedger<BackgroundMusicAsset>,
}

impl BackgroundMusicAssetManager {
    pub fn new(paths: Arc<ChapterPaths>, generators: Arc<GeneratorSet>) -> Result<Self> {
        let recipe = RecipeStore::load(paths.clone(), paths.background_music_recipe_file.clone())?;
        let mut assets = AssetLedger::load(
            paths.clone(),
            paths.background_music_asset_file.clone(),
            "background_music",
        )?;
        assets.synchronize_size_to(recipe.len());
        assets.save()?;

        info!(
            "background music manager ready: {} scenes, {} missing",
            recipe.len(),
            assets.missing_indices().len()
        );

        Ok(BackgroundMusicAssetManager {
            paths,
            generators,
            recipe,
            assets,
        })
    }

    pub async fn generate_assets(&mut self) -> Result<()> {
        for scene_index in self.assets.missing_indices() {
            if let Err(err) = self.generate_music_asset(scene_index).await {
                error!(
                    "failed to generate background music for scene {}: {err:#}",
                    scene_index + 1
                );
            }
        }
        Ok(())
    }

    pub async fn generate_music_asset(&mut self, scene_index: usize) -> Result<()> {
        let recipe = self
            .recipe
            .get(scene_index)
            .cloned()
            .with_context(|| format!("no music recipe for scene {}", scene_index + 1))?;

        if scene_index > 0 && self.recipe.get(scene_index - 1) == Some(&recipe) {
            let previous = self.assets.get(scene_index - 1).cloned().unwrap_or_default();
            if previous.is_present() {
                self.assets.set(scene_index, previous)?;
                self.assets.save()?;
                info!(
                    "scene {} reuses the previous scene's music, recipe unchanged",
                    scene_index + 1
                );
                return Ok(());
            }
        }

        let generator = self.generators.music_for(&recipe);
        let output = self
            .paths
            .background_music_asset_folder
            .join(self.paths.scene_output_name("music", scene_index));

        let artifact = generator.text_to_music(&recipe, &output).await?;

        self.assets
            .set(scene_index, BackgroundMusicAsset::new(artifact))?;
        self.assets.save()?;
        info!("generated background music for scene {}", scene_index + 1);
        Ok(())
    }
}
