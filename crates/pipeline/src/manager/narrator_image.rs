use crate::generators::GeneratorSet;
use crate::ledger::{AssetLedger, ImageAsset, NarratorAsset};
use crate::paths::ChapterPaths;
use crate::recipe::{ImageRecipe, NarratorRecipe, RecipeStore};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

/// Drives the image and narration families from "missing" to "present",
/// image first then narration for each scene, persisting the ledger after
/// every artifact so an interrupted run never redoes finished scenes.
pub struct NarratorAndImageAssetManager {
    paths: Arc<ChapterPaths>,
    generators: Arc<GeneratorSet>,
    pub narrator_recipe: RecipeStore<NarratorRecipe>,
    pub narrator_assets: AssetLedger<NarratorAsset>,
    pub image_recipe: RecipeStore<ImageRecipe>,
    pub image_assets: AssetLedger<ImageAsset>,
}

impl NarratorAndImageAssetManager {
    pub fn new(paths: Arc<ChapterPaths>, generators: Arc<GeneratorSet>) -> Result<Self> {
        let narrator_recipe =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone())?;
        let mut narrator_assets =
            AssetLedger::load(paths.clone(), paths.narrator_asset_file.clone(), "narrator")?;
        let image_recipe = RecipeStore::load(paths.clone(), paths.image_recipe_file.clone())?;
        let mut image_assets =
            AssetLedger::load(paths.clone(), paths.image_asset_file.clone(), "image")?;

        narrator_assets.synchronize_size_to(narrator_recipe.len());
        narrator_assets.save()?;
        image_assets.synchronize_size_to(image_recipe.len());
        image_assets.save()?;

        info!(
            "narrator+image manager ready: {} scenes, {} narrations missing, {} images missing",
            narrator_recipe.len(),
            narrator_assets.missing_indices().len(),
            image_assets.missing_indices().len()
        );

        Ok(NarratorAndImageAssetManager {
            paths,
            generators,
            narrator_recipe,
            narrator_assets,
            image_recipe,
            image_assets,
        })
    }

    /// Generate everything still missing, in ascending scene order. A
    /// failed scene is logged and left missing for the next run; the loop
    /// moves on.
    pub async fn generate_assets(&mut self) -> Result<()> {
        let missing: BTreeSet<usize> = self
            .narrator_assets
            .missing_indices()
            .into_iter()
            .chain(self.image_assets.missing_indices())
            .collect();

        info!("{} scene(s) need narrator or image work", missing.len());

        for scene_index in missing {
            if !self.image_assets.has(scene_index) {
                if let Err(err) = self.generate_image_asset(scene_index).await {
                    error!("failed to generate image for scene {}: {err:#}", scene_index + 1);
                }
            }
            if !self.narrator_assets.has(scene_index) {
                if let Err(err) = self.generate_narrator_asset(scene_index).await {
                    error!(
                        "failed to generate narration for scene {}: {err:#}",
                        scene_index + 1
                    );
                }
            }
        }
        Ok(())
    }

    pub async fn generate_image_asset(&mut self, scene_index: usize) -> Result<()> {
        let recipe = self
            .image_recipe
            .get(scene_index)
            .cloned()
            .with_context(|| format!("no image recipe for scene {}", scene_index + 1))?;
        let generator = self.generators.image_for(&recipe);
        let output = self
            .paths
            .image_asset_folder
            .join(self.paths.scene_output_name("image", scene_index));

        let artifact = generator.text_to_image(&recipe, &output).await?;

        self.image_assets
            .set(scene_index, ImageAsset::new(artifact))?;
        self.image_assets.save()?;
        info!("generated image for scene {}", scene_index + 1);
        Ok(())
    }

    pub async fn generate_narrator_asset(&mut self, scene_index: usize) -> Result<()> {
        let recipe = self
            .narrator_recipe
            .get(scene_index)
            .cloned()
            .with_context(|| format!("no narrator recipe for scene {}", scene_index + 1))?;
        let generator = self.generators.speech_for(&recipe);
        let output = self
            .paths
            .narrator_asset_folder
            .join(self.paths.scene_output_name("narrator", scene_index));

        let artifact = generator.clone_text_to_speech(&recipe, &output).await?;

        self.narrator_assets
            .set(scene_index, NarratorAsset::new(artifact))?;
        self.narrator_assets.save()?;
        info!("generated narration for scene {}", scene_index + 1);
        Ok(())
    }

    /// Clear and regenerate one scene, e.g. after a bad take.
    pub async fn regenerate_scene(&mut self, scene_index: usize) -> Result<()> {
        self.narrator_assets.clear(scene_index)?;
        self.image_assets.clear(scene_index)?;
        self.narrator_assets.save()?;
        self.image_assets.save()?;
        self.generate_image_asset(scene_index).await?;
        self.generate_narrator_asset(scene_index).await
    }
}
