use super::RecipeEntry;
use serde::{Deserialize, Serialize};

/// Background-music recipe for one scene. Value equality matters here:
/// consecutive scenes with equal recipes share one generated track instead
/// of invoking the generator again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recipe_type")]
pub enum MusicRecipe {
    #[serde(rename = "MusicGenRecipe")]
    MusicGen {
        prompt: String,
        mood: String,
        seed: i64,
    },
}

impl MusicRecipe {
    pub fn prompt(&self) -> &str {
        match self {
            MusicRecipe::MusicGen { prompt, .. } => prompt,
        }
    }

    pub fn mood(&self) -> &str {
        match self {
            MusicRecipe::MusicGen { mood, .. } => mood,
        }
    }
}

impl RecipeEntry for MusicRecipe {
    const DATA_KEY: &'static str = "music_data";
}
