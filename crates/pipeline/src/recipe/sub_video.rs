use super::RecipeEntry;
use crate::error::PipelineError;
use crate::paths::ChapterPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One generated clip inside a scene. The first clip of a scene is usually
/// text-to-video; follow-ups continue from a still frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recipe_type")]
pub enum ClipRecipe {
    #[serde(rename = "WanT2vRecipe")]
    WanT2v {
        prompt: String,
        seed: i64,
        width: u32,
        height: u32,
    },
    #[serde(rename = "WanI2vRecipe")]
    WanI2v {
        prompt: String,
        seed: i64,
        width: u32,
        height: u32,
        media_path: Option<PathBuf>,
    },
}

impl ClipRecipe {
    pub fn prompt(&self) -> &str {
        match self {
            ClipRecipe::WanT2v { prompt, .. } | ClipRecipe::WanI2v { prompt, .. } => prompt,
        }
    }
}

/// Sub-video recipe for one scene: the ordered clips whose concatenation
/// becomes the scene's footage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubVideoRecipe {
    pub clips: Vec<ClipRecipe>,
}

impl RecipeEntry for SubVideoRecipe {
    const DATA_KEY: &'static str = "video_data";

    fn mask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
        let clips = self
            .clips
            .iter()
            .map(|clip| match clip {
                ClipRecipe::WanI2v {
                    prompt,
                    seed,
                    width,
                    height,
                    media_path: Some(media_path),
                } => Ok(ClipRecipe::WanI2v {
                    prompt: prompt.clone(),
                    seed: *seed,
                    width: *width,
                    height: *height,
                    media_path: Some(PathBuf::from(paths.mask(media_path)?)),
                }),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(SubVideoRecipe { clips })
    }

    fn unmask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
        let clips = self
            .clips
            .iter()
            .map(|clip| match clip {
                ClipRecipe::WanI2v {
                    prompt,
                    seed,
                    width,
                    height,
                    media_path: Some(media_path),
                } => Ok(ClipRecipe::WanI2v {
                    prompt: prompt.clone(),
                    seed: *seed,
                    width: *width,
                    height: *height,
                    media_path: Some(paths.unmask(&media_path.to_string_lossy())?),
                }),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(SubVideoRecipe { clips })
    }
}

impl SubVideoRecipe {
    /// Image assets referenced by this scene's clips.
    pub fn referenced_paths(&self) -> Vec<PathBuf> {
        self.clips
            .iter()
            .filter_map(|clip| match clip {
                ClipRecipe::WanI2v { media_path, .. } => media_path.clone(),
                ClipRecipe::WanT2v { .. } => None,
            })
            .collect()
    }
}
