use crate::ledger::{
    AssemblerAssets, AssetLedger, BackgroundMusicAsset, ImageAsset, NarratorAsset, SubVideoAsset,
};
use crate::paths::ChapterPaths;
use crate::recipe::{AssemblerRecipeStore, RecipeStore, SubVideoRecipe};
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Sweep the chapter's asset folders, deleting regular files no ledger or
/// recipe references anymore. Returns the number of files removed.
pub fn clean_unused_assets(paths: Arc<ChapterPaths>) -> Result<usize> {
    info!("cleaning unused assets for {}", paths.chapter_tag());

    let narrator_assets: AssetLedger<NarratorAsset> =
        AssetLedger::load(paths.clone(), paths.narrator_asset_file.clone(), "narrator")?;
    let image_assets: AssetLedger<ImageAsset> =
        AssetLedger::load(paths.clone(), paths.image_asset_file.clone(), "image")?;
    let sub_video_assets: AssetLedger<SubVideoAsset> = AssetLedger::load(
        paths.clone(),
        paths.sub_video_asset_file.clone(),
        "sub_video",
    )?;
    let music_assets: AssetLedger<BackgroundMusicAsset> = AssetLedger::load(
        paths.clone(),
        paths.background_music_asset_file.clone(),
        "background_music",
    )?;
    let sub_video_recipe: RecipeStore<SubVideoRecipe> =
        RecipeStore::load(paths.clone(), paths.sub_video_recipe_file.clone())?;
    let assembler_recipe = AssemblerRecipeStore::load(paths.clone())?;
    let assembler_assets = AssemblerAssets::load(paths.clone())?;

    let mut keep: HashSet<PathBuf> = HashSet::new();
    keep.extend(narrator_assets.referenced_paths());
    keep.extend(image_assets.referenced_paths());
    keep.extend(sub_video_assets.referenced_paths());
    keep.extend(music_assets.referenced_paths());
    keep.extend(
        sub_video_recipe
            .entries()
            .iter()
            .flat_map(SubVideoRecipe::referenced_paths),
    );
    keep.extend(assembler_recipe.referenced_paths());
    keep.extend(assembler_assets.referenced_paths());

    let folders = [
        &paths.narrator_asset_folder,
        &paths.image_asset_folder,
        &paths.sub_video_asset_folder,
        &paths.background_music_asset_folder,
        &paths.assembler_asset_folder,
    ];

    let mut removed = 0;
    for folder in folders {
        let entries = match std::fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && !keep.contains(&path) {
                debug!("deleting unused asset: {}", path.display());
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
    }

    info!("unused asset cleanup removed {removed} file(s)");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keeps_referenced_files_and_removes_orphans() {
        let dir = TempDir::new().unwrap();
        let defaults = dir.path().join("shared_defaults");
        std::fs::create_dir_all(&defaults).unwrap();
        let paths = Arc::new(ChapterPaths::new(dir.path(), "story", 0, &defaults).unwrap());

        let kept = paths.narrator_asset_folder.join("kept.mp3");
        std::fs::write(&kept, b"x").unwrap();
        let orphan = paths.narrator_asset_folder.join("orphan.mp3");
        std::fs::write(&orphan, b"x").unwrap();
        let stray_image = paths.image_asset_folder.join("stray.png");
        std::fs::write(&stray_image, b"x").unwrap();

        let mut ledger: AssetLedger<NarratorAsset> =
            AssetLedger::load(paths.clone(), paths.narrator_asset_file.clone(), "narrator")
                .unwrap();
        ledger.synchronize_size_to(1);
        ledger.set(0, NarratorAsset::new(kept.clone())).unwrap();
        ledger.save().unwrap();

        let removed = clean_unused_assets(paths).unwrap();

        assert_eq!(removed, 2);
        assert!(kept.exists());
        assert!(!orphan.exists());
        assert!(!stray_image.exists());
    }
}
