use super::RecipeEntry;
use serde::{Deserialize, Serialize};

/// Target frame shape for generated stills and clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Square,
}

impl AspectRatio {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1280, 720),
            AspectRatio::Portrait => (720, 1280),
            AspectRatio::Square => (1024, 1024),
        }
    }
}

/// Still-image recipe for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recipe_type")]
pub enum ImageRecipe {
    #[serde(rename = "FluxImageRecipe")]
    Flux {
        prompt: String,
        seed: i64,
        width: u32,
        height: u32,
    },
}

impl ImageRecipe {
    pub fn prompt(&self) -> &str {
        match self {
            ImageRecipe::Flux { prompt, .. } => prompt,
        }
    }
}

impl RecipeEntry for ImageRecipe {
    const DATA_KEY: &'static str = "image_data";
}
