use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One narrated scene of a chapter. Loaded once from the prompt document
/// and never mutated; the position in the list is the scene identity used
/// by every downstream store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePrompt {
    #[serde(default)]
    pub narrator: String,
    #[serde(default)]
    pub visual_description: String,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default)]
    pub scene_time_period: String,
    #[serde(default)]
    pub mood: String,
}

#[derive(Deserialize)]
struct PromptDocument {
    #[serde(default)]
    prompts: Vec<ScenePrompt>,
}

impl ScenePrompt {
    /// Load the chapter's prompt list. Unreadable or malformed documents
    /// load as the empty list; the recipe builders refuse to run on a
    /// count mismatch, so nothing downstream acts on partial data.
    pub fn load_from_json(path: &Path) -> Vec<ScenePrompt> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!("could not read prompt file {}: {err}", path.display());
                return Vec::new();
            }
        };
        match serde_json::from_str::<PromptDocument>(&text) {
            Ok(document) => document.prompts,
            Err(err) => {
                warn!("could not parse prompt file {}: {err}", path.display());
                Vec::new()
            }
        }
    }
}
