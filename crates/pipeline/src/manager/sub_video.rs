use crate::generators::GeneratorSet;
use crate::ledger::{AssetLedger, SubVideoAsset};
use crate::media::Compositor;
use crate::paths::ChapterPaths;
use crate::recipe::{RecipeStore, SubVideoRecipe};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Drives the sub-video family: each scene's clip recipes are generated in
/// order and concatenated into the scene's footage, which is what the
/// ledger records.
pub struct SubVideoAssetManager {
    paths: Arc<ChapterPaths>,
    generators: Arc<GeneratorSet>,
    compositor: Arc<dyn Compositor>,
    pub recipe: RecipeStore<SubVideoRecipe>,
    pub assets: AssetLedger<SubVideoAsset>,
}

impl SubVideoAssetManager {
    pub fn new(
        paths: Arc<ChapterPaths>,
        generators: Arc<GeneratorSet>,
        compositor: Arc<dyn Compositor>,
    ) -> Result<Self> {
        let recipe = RecipeStore::load(paths.clone(), paths.sub_video_recipe_file.clone())?;
        let mut assets = AssetLedger::load(
            paths.clone(),
            paths.sub_video_asset_file.clone(),
            "sub_video",
        )?;
        assets.synchronize_size_to(recipe.len());
        assets.save()?;

        info!(
            "sub-video manager ready: {} scenes, {} missing",
            recipe.len(),
            assets.missing_indices().len()
        );

        Ok(SubVideoAssetManager {
            paths,
            generators,
            compositor,
            recipe,
            assets,
        })
    }

    pub async fn generate_assets(&mut self) -> Result<()> {
        for scene_index in self.assets.missing_indices() {
            if let Err(err) = self.generate_sub_video_asset(scene_index).await {
                error!(
                    "failed to generate sub-video for scene {}: {err:#}",
                    scene_index + 1
                );
            }
        }
        Ok(())
    }

    pub async fn generate_sub_video_asset(&mut self, scene_index: usize) -> Result<()> {
        let recipe = self
            .recipe
            .get(scene_index)
            .cloned()
            .with_context(|| format!("no sub-video recipe for scene {}", scene_index + 1))?;
        if recipe.clips.is_empty() {
            bail!("scene {} has no clip recipes", scene_index + 1);
        }

        let base_name = self.paths.scene_output_name("sub_video", scene_index);
        let mut clip_paths = Vec::with_capacity(recipe.clips.len());
        for (clip_index, clip) in recipe.clips.iter().enumerate() {
            let generator = self.generators.clip_for(clip);
            let output = self
                .paths
                .sub_video_asset_folder
                .join(format!("{base_name}_part_{:02}", clip_index + 1));
            clip_paths.push(generator.generate_clip(clip, &output).await?);
        }

        let assembled_target = self
            .paths
            .sub_video_asset_folder
            .join(format!("{base_name}.mp4"));
        let assembled = self
            .compositor
            .concat_clips(&clip_paths, &assembled_target)
            .await?;

        self.assets
            .set(scene_index, SubVideoAsset::new(assembled))?;
        self.assets.save()?;
        info!(
            "generated sub-video for scene {} from {} clip(s)",
            scene_index + 1,
            recipe.clips.len()
        );
        Ok(())
    }
}
