use super::RecipeEntry;
use crate::error::PipelineError;
use crate::paths::ChapterPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Narration recipe for one scene. The tag names the speech back-end the
/// entry deserializes into; an unrecognized tag fails the document load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recipe_type")]
pub enum NarratorRecipe {
    #[serde(rename = "ZonosTtsRecipe")]
    ZonosTts {
        prompt: String,
        seed: i64,
        clone_voice_path: PathBuf,
    },
}

impl NarratorRecipe {
    pub fn prompt(&self) -> &str {
        match self {
            NarratorRecipe::ZonosTts { prompt, .. } => prompt,
        }
    }
}

impl RecipeEntry for NarratorRecipe {
    const DATA_KEY: &'static str = "narrator_data";

    fn mask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
        match self {
            NarratorRecipe::ZonosTts {
                prompt,
                seed,
                clone_voice_path,
            } => Ok(NarratorRecipe::ZonosTts {
                prompt: prompt.clone(),
                seed: *seed,
                clone_voice_path: PathBuf::from(paths.mask(clone_voice_path)?),
            }),
        }
    }

    fn unmask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
        match self {
            NarratorRecipe::ZonosTts {
                prompt,
                seed,
                clone_voice_path,
            } => Ok(NarratorRecipe::ZonosTts {
                prompt: prompt.clone(),
                seed: *seed,
                clone_voice_path: paths.unmask(&clone_voice_path.to_string_lossy())?,
            }),
        }
    }
}
