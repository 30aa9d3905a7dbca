pub mod assembler;
pub mod image;
pub mod music;
pub mod narrator;
pub mod sub_video;

pub use assembler::{
    AssemblerRecipe, AssemblerRecipeStore, EndingRecipe, IntroRecipe, OverlayRecipe,
    SubtitleRecipe,
};
pub use image::ImageRecipe;
pub use music::MusicRecipe;
pub use narrator::NarratorRecipe;
pub use sub_video::{ClipRecipe, SubVideoRecipe};

use crate::error::PipelineError;
use crate::paths::ChapterPaths;
use crate::util::{backup_file_to_old, write_json_document};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// One persisted recipe entry. Families only supply their serialization
/// shape (a closed `recipe_type`-tagged union) and how their embedded
/// asset paths are masked for storage.
pub trait RecipeEntry: Serialize + DeserializeOwned + Clone {
    /// Top-level key of the persisted document, e.g. `narrator_data`.
    const DATA_KEY: &'static str;

    fn mask_paths(&self, _paths: &ChapterPaths) -> Result<Self, PipelineError> {
        Ok(self.clone())
    }

    fn unmask_paths(&self, _paths: &ChapterPaths) -> Result<Self, PipelineError> {
        Ok(self.clone())
    }
}

/// Declarative "what should exist" store for one asset family, persisted
/// as a single JSON document and rewritten wholesale on every mutation.
pub struct RecipeStore<R: RecipeEntry> {
    paths: Arc<ChapterPaths>,
    file_path: PathBuf,
    entries: Vec<R>,
}

impl<R: RecipeEntry> RecipeStore<R> {
    /// Load the store from disk. A missing document is an empty store; a
    /// document that fails to parse (including an unrecognized
    /// `recipe_type` tag) is backed up to `.old` and replaced with a
    /// fresh, valid, empty one.
    pub fn load(paths: Arc<ChapterPaths>, file_path: PathBuf) -> Result<Self> {
        let mut store = RecipeStore {
            paths,
            file_path,
            entries: Vec::new(),
        };

        let text = match std::fs::read_to_string(&store.file_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "recipe document not found: {} - starting empty",
                    store.file_path.display()
                );
                return Ok(store);
            }
            Err(err) => return Err(err.into()),
        };

        match store.parse_entries(&text) {
            Ok(entries) => {
                store.entries = entries;
                Ok(store)
            }
            Err(err) => {
                error!(
                    "corrupted recipe document {}: {err} - backing up and reinitializing",
                    store.file_path.display()
                );
                backup_file_to_old(&store.file_path)?;
                store.entries.clear();
                store.save()?;
                Ok(store)
            }
        }
    }

    fn parse_entries(&self, text: &str) -> Result<Vec<R>> {
        let document: serde_json::Value = serde_json::from_str(text)?;
        let items = document
            .get(R::DATA_KEY)
            .and_then(|value| value.as_array())
            .cloned()
            .unwrap_or_default();

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let entry: R = serde_json::from_value(item)?;
            entries.push(entry.unmask_paths(&self.paths)?);
        }
        Ok(entries)
    }

    pub fn append(&mut self, entry: R) -> Result<()> {
        self.entries.push(entry);
        self.save()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, scene_index: usize) -> Option<&R> {
        self.entries.get(scene_index)
    }

    pub fn entries(&self) -> &[R] {
        &self.entries
    }

    /// The recipe list must track the scene prompt count; anything else is
    /// drift and the whole store is stale.
    pub fn is_consistent_with(&self, prompt_count: usize) -> bool {
        self.entries.len() == prompt_count
    }

    pub fn save(&self) -> Result<()> {
        let mut items = Vec::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            let masked = entry.mask_paths(&self.paths)?;
            let mut value = serde_json::to_value(&masked)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("index".to_string(), serde_json::json!(i + 1));
            }
            items.push(value);
        }
        let document = serde_json::json!({ R::DATA_KEY: items });
        write_json_document(&self.file_path, &document)
    }
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
    fn missing_document_loads_empty() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let store: RecipeStore<NarratorRecipe> =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn append_persists_immediately_and_reloads() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let voice = paths.default_assets_folder().join("voice.mp3");
        std::fs::write(&voice, b"x").unwrap();

        let mut store: RecipeStore<NarratorRecipe> =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone()).unwrap();
        store
            .append(NarratorRecipe::ZonosTts {
                prompt: "hello".to_string(),
                seed: 7,
                clone_voice_path: voice.clone(),
            })
            .unwrap();

        let reloaded: RecipeStore<NarratorRecipe> =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone()).unwrap();
        assert_eq!(reloaded.len(), 1);
        let NarratorRecipe::ZonosTts {
            prompt,
            clone_voice_path,
            ..
        } = reloaded.get(0).unwrap();
        assert_eq!(prompt.as_str(), "hello");
        assert_eq!(clone_voice_path, &voice);

        // The persisted form is masked, never absolute.
        let text = std::fs::read_to_string(&paths.narrator_recipe_file).unwrap();
        assert!(text.contains("default_assets/voice.mp3"));
        assert!(!text.contains(dir.path().to_str().unwrap()));
    }

    #[test]
    fn corrupted_document_is_backed_up_and_reinitialized() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        std::fs::write(&paths.narrator_recipe_file, b"{not json").unwrap();

        let store: RecipeStore<NarratorRecipe> =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone()).unwrap();

        assert!(store.is_empty());
        let backup = paths.narrator_recipe_file.with_extension("json.old");
        assert_eq!(std::fs::read(&backup).unwrap(), b"{not json");
        // A fresh valid document replaced the corrupted one.
        let text = std::fs::read_to_string(&paths.narrator_recipe_file).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }

    #[test]
    fn unknown_recipe_tag_is_treated_as_corruption() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        std::fs::write(
            &paths.narrator_recipe_file,
            r#"{"narrator_data": [{"index": 1, "prompt": "x", "recipe_type": "NotARealRecipe"}]}"#,
        )
        .unwrap();

        let store: RecipeStore<NarratorRecipe> =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone()).unwrap();

        assert!(store.is_empty());
        assert!(paths
            .narrator_recipe_file
            .with_extension("json.old")
            .exists());
    }

    #[test]
    fn consistency_tracks_prompt_count() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let voice = paths.default_assets_folder().join("voice.mp3");
        std::fs::write(&voice, b"x").unwrap();

        let mut store: RecipeStore<NarratorRecipe> =
            RecipeStore::load(paths.clone(), paths.narrator_recipe_file.clone()).unwrap();
        assert!(store.is_consistent_with(0));
        store
            .append(NarratorRecipe::ZonosTts {
                prompt: "a".to_string(),
                seed: 1,
                clone_voice_path: voice,
            })
            .unwrap();
        assert!(store.is_consistent_with(1));
        assert!(!store.is_consistent_with(2));
    }
}
