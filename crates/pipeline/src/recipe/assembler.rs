use crate::error::PipelineError;
use crate::paths::ChapterPaths;
use crate::util::{backup_file_to_old, write_json_document};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

fn default_silence_gap() -> f64 {
    0.5
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntroRecipe {
    pub asset: Option<PathBuf>,
    #[serde(default)]
    pub skip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingRecipe {
    /// Narration lines spoken over the ending, concatenated with fixed
    /// silence gaps between them.
    #[serde(default)]
    pub narration_lines: Vec<String>,
    pub clone_voice_path: Option<PathBuf>,
    #[serde(default)]
    pub seed: i64,
    /// Sub-clip the ending narration plays over; defaults to the first
    /// scene's clip when unset.
    pub sub_video: Option<PathBuf>,
    pub overlay_asset: Option<PathBuf>,
    /// 1-based narration line the overlay appears with.
    #[serde(default)]
    pub overlay_start_line: usize,
    #[serde(default)]
    pub start_delay_seconds: f64,
    #[serde(default = "default_silence_gap")]
    pub silence_gap_seconds: f64,
    #[serde(default)]
    pub skip: bool,
}

impl Default for EndingRecipe {
    fn default() -> Self {
        EndingRecipe {
            narration_lines: Vec::new(),
            clone_voice_path: None,
            seed: 0,
            sub_video: None,
            overlay_asset: None,
            overlay_start_line: 1,
            start_delay_seconds: 0.0,
            silence_gap_seconds: default_silence_gap(),
            skip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRecipe {
    pub asset: Option<PathBuf>,
    #[serde(default)]
    pub start_time_seconds: f64,
    /// Repeat interval; negative means place the overlay once.
    #[serde(default)]
    pub interval_seconds: f64,
    #[serde(default)]
    pub allow_extend: bool,
    #[serde(default)]
    pub skip: bool,
}

impl Default for OverlayRecipe {
    fn default() -> Self {
        OverlayRecipe {
            asset: None,
            start_time_seconds: 0.0,
            interval_seconds: -1.0,
            allow_extend: false,
            skip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleRecipe {
    #[serde(default)]
    pub burn_into_video: bool,
    #[serde(default)]
    pub skip: bool,
}

impl Default for SubtitleRecipe {
    fn default() -> Self {
        SubtitleRecipe {
            burn_into_video: false,
            skip: true,
        }
    }
}

/// Chapter-level assembly options: intro and ending segments, the
/// repeating overlay and subtitle settings. One document per chapter,
/// rewritten wholesale; all embedded paths are stored masked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblerRecipe {
    #[serde(default)]
    pub intro: IntroRecipe,
    #[serde(default)]
    pub ending: EndingRecipe,
    #[serde(default)]
    pub overlay: OverlayRecipe,
    #[serde(default)]
    pub subtitles: SubtitleRecipe,
}

/// Owning wrapper that ties the options document to its file and masking
/// context.
pub struct AssemblerRecipeStore {
    paths: Arc<ChapterPaths>,
    file_path: PathBuf,
    pub recipe: AssemblerRecipe,
}

impl AssemblerRecipeStore {
    pub fn load(paths: Arc<ChapterPaths>) -> Result<Self> {
        let file_path = paths.assembler_recipe_file.clone();
        let mut store = AssemblerRecipeStore {
            paths,
            file_path,
            recipe: AssemblerRecipe::default(),
        };

        let text = match std::fs::read_to_string(&store.file_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "assembler recipe not found: {} - starting with defaults",
                    store.file_path.display()
                );
                return Ok(store);
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<AssemblerRecipe>(&text)
            .map_err(anyhow::Error::from)
            .and_then(|recipe| unmask_recipe(&recipe, &store.paths).map_err(Into::into))
        {
            Ok(recipe) => store.recipe = recipe,
            Err(err) => {
                error!(
                    "corrupted assembler recipe {}: {err} - backing up and reinitializing",
                    store.file_path.display()
                );
                backup_file_to_old(&store.file_path)?;
                store.recipe = AssemblerRecipe::default();
                store.save()?;
            }
        }
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        let masked = mask_recipe(&self.recipe, &self.paths)?;
        let document = serde_json::to_value(&masked)?;
        write_json_document(&self.file_path, &document)
    }

    /// Record the clip the ending was built from, so reruns keep using it.
    pub fn set_ending_sub_video(&mut self, clip: &Path) -> Result<()> {
        self.recipe.ending.sub_video = Some(clip.to_path_buf());
        self.save()
    }

    /// External assets this document pins (intro/ending/overlay clips).
    pub fn referenced_paths(&self) -> Vec<PathBuf> {
        [
            self.recipe.intro.asset.clone(),
            self.recipe.ending.sub_video.clone(),
            self.recipe.ending.overlay_asset.clone(),
            self.recipe.ending.clone_voice_path.clone(),
            self.recipe.overlay.asset.clone(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn mask_path(
    path: &Option<PathBuf>,
    paths: &ChapterPaths,
) -> Result<Option<PathBuf>, PipelineError> {
    path.as_ref()
        .map(|p| paths.mask(p).map(PathBuf::from))
        .transpose()
}

fn unmask_path(
    path: &Option<PathBuf>,
    paths: &ChapterPaths,
) -> Result<Option<PathBuf>, PipelineError> {
    path.as_ref()
        .map(|p| paths.unmask(&p.to_string_lossy()))
        .transpose()
}

fn mask_recipe(
    recipe: &AssemblerRecipe,
    paths: &ChapterPaths,
) -> Result<AssemblerRecipe, PipelineError> {
    let mut masked = recipe.clone();
    masked.intro.asset = mask_path(&recipe.intro.asset, paths)?;
    masked.ending.sub_video = mask_path(&recipe.ending.sub_video, paths)?;
    masked.ending.overlay_asset = mask_path(&recipe.ending.overlay_asset, paths)?;
    masked.ending.clone_voice_path = mask_path(&recipe.ending.clone_voice_path, paths)?;
    masked.overlay.asset = mask_path(&recipe.overlay.asset, paths)?;
    Ok(masked)
}

fn unmask_recipe(
    recipe: &AssemblerRecipe,
    paths: &ChapterPaths,
) -> Result<AssemblerRecipe, PipelineError> {
    let mut unmasked = recipe.clone();
    unmasked.intro.asset = unmask_path(&recipe.intro.asset, paths)?;
    unmasked.ending.sub_video = unmask_path(&recipe.ending.sub_video, paths)?;
    unmasked.ending.overlay_asset = unmask_path(&recipe.ending.overlay_asset, paths)?;
    unmasked.ending.clone_voice_path = unmask_path(&recipe.ending.clone_voice_path, paths)?;
    unmasked.overlay.asset = unmask_path(&recipe.overlay.asset, paths)?;
    Ok(unmasked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chapter_paths(dir: &TempDir) -> Arc<ChapterPaths> {
        let defaults = dir.path().join("shared_defaults");
        std::fs::create_dir_all(&defaults).unwrap();
        Arc::new(ChapterPaths::new(dir.path(), "story", 0, &defaults).unwrap())
    }

    #[test]
    fn defaults_skip_every_optional_segment() {
        let dir = TempDir::new().unwrap();
        let store = AssemblerRecipeStore::load(chapter_paths(&dir)).unwrap();
        assert!(store.recipe.intro.asset.is_none());
        assert!(store.recipe.ending.skip);
        assert!(store.recipe.overlay.skip);
        assert!(store.recipe.subtitles.skip);
    }

    #[test]
    fn paths_round_trip_masked_through_disk() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let intro = paths.default_assets_folder().join("intro.mp4");
        std::fs::write(&intro, b"x").unwrap();

        let mut store = AssemblerRecipeStore::load(paths.clone()).unwrap();
        store.recipe.intro = IntroRecipe {
            asset: Some(intro.clone()),
            skip: false,
        };
        store.save().unwrap();

        let text = std::fs::read_to_string(&paths.assembler_recipe_file).unwrap();
        assert!(text.contains("default_assets/intro.mp4"));

        let reloaded = AssemblerRecipeStore::load(paths).unwrap();
        assert_eq!(reloaded.recipe.intro.asset, Some(intro));
    }

    #[test]
    fn corrupted_document_recovers_with_backup() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        std::fs::write(&paths.assembler_recipe_file, b"broken{").unwrap();

        let store = AssemblerRecipeStore::load(paths.clone()).unwrap();
        assert_eq!(store.recipe, AssemblerRecipe::default());
        assert!(paths
            .assembler_recipe_file
            .with_extension("json.old")
            .exists());
    }
}
