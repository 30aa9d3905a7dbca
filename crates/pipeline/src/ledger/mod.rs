pub mod assembler;
pub mod records;

pub use assembler::AssemblerAssets;
pub use records::{BackgroundMusicAsset, ImageAsset, NarratorAsset, SubVideoAsset};

use crate::error::PipelineError;
use crate::paths::ChapterPaths;
use crate::util::{backup_file_to_old, write_json_document};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One scene's asset record. Families supply the serialization shape, the
/// existence predicate and how embedded paths are masked.
pub trait AssetRecord: Serialize + DeserializeOwned + Clone + Default {
    /// A value has been recorded, whether or not the file still exists.
    fn is_set(&self) -> bool;

    /// The record counts as present: the reference resolves to an existing
    /// regular file (or the record is an explicit skip).
    fn is_present(&self) -> bool;

    fn referenced_paths(&self) -> Vec<PathBuf>;

    /// Accept only paths the addressing layer can mask (absolute, inside a
    /// known root, not a folder).
    fn validate(&self, paths: &ChapterPaths) -> Result<(), PipelineError>;

    fn mask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError>;
    fn unmask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError>;
}

/// Declarative "what currently exists" record for one asset family, one
/// entry per scene including empty placeholders. Mutated one scene at a
/// time and rewritten wholesale after every mutation.
pub struct AssetLedger<A: AssetRecord> {
    paths: Arc<ChapterPaths>,
    file_path: PathBuf,
    family: &'static str,
    records: Vec<A>,
}

impl<A: AssetRecord> AssetLedger<A> {
    pub fn load(paths: Arc<ChapterPaths>, file_path: PathBuf, family: &'static str) -> Result<Self> {
        let mut ledger = AssetLedger {
            paths,
            file_path,
            family,
            records: Vec::new(),
        };

        let text = match std::fs::read_to_string(&ledger.file_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "{family} ledger not found: {} - starting empty",
                    ledger.file_path.display()
                );
                return Ok(ledger);
            }
            Err(err) => return Err(err.into()),
        };

        match ledger.parse_records(&text) {
            Ok(records) => {
                ledger.records = records;
                Ok(ledger)
            }
            Err(err) => {
                error!(
                    "corrupted {family} ledger {}: {err} - backing up and reinitializing",
                    ledger.file_path.display()
                );
                backup_file_to_old(&ledger.file_path)?;
                ledger.records.clear();
                ledger.save()?;
                Ok(ledger)
            }
        }
    }

    fn parse_records(&self, text: &str) -> Result<Vec<A>> {
        let document: serde_json::Value = serde_json::from_str(text)?;
        let items = document
            .get("assets")
            .and_then(|value| value.as_array())
            .cloned()
            .unwrap_or_default();

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let record: A = serde_json::from_value(item)?;
            match record.unmask_paths(&self.paths) {
                Ok(record) => records.push(record),
                Err(err) => {
                    // A single unresolvable reference degrades to "missing"
                    // so the scene is regenerated instead of crashing the run.
                    warn!("{} ledger entry dropped: {err}", self.family);
                    records.push(A::default());
                }
            }
        }
        Ok(records)
    }

    /// Enforce the ledger/recipe size invariant: pad with empty records or
    /// truncate so missing-index detection is a linear scan.
    pub fn synchronize_size_to(&mut self, scene_count: usize) {
        while self.records.len() < scene_count {
            self.records.push(A::default());
        }
        self.records.truncate(scene_count);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, scene_index: usize) -> Option<&A> {
        self.records.get(scene_index)
    }

    pub fn set(&mut self, scene_index: usize, record: A) -> Result<(), PipelineError> {
        if scene_index >= self.records.len() {
            return Err(PipelineError::SceneOutOfRange {
                index: scene_index,
                len: self.records.len(),
            });
        }
        record.validate(&self.paths)?;
        self.records[scene_index] = record;
        Ok(())
    }

    pub fn clear(&mut self, scene_index: usize) -> Result<(), PipelineError> {
        if scene_index >= self.records.len() {
            return Err(PipelineError::SceneOutOfRange {
                index: scene_index,
                len: self.records.len(),
            });
        }
        self.records[scene_index] = A::default();
        Ok(())
    }

    /// Existence check, not presence check: a recorded path whose file was
    /// deleted out-of-band reads as missing again.
    pub fn has(&self, scene_index: usize) -> bool {
        self.records
            .get(scene_index)
            .map(A::is_present)
            .unwrap_or(false)
    }

    pub fn missing_indices(&self) -> Vec<usize> {
        (0..self.records.len())
            .filter(|index| !self.has(*index))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.records.is_empty() && self.missing_indices().is_empty()
    }

    pub fn ensure_complete(&self) -> Result<(), PipelineError> {
        let missing = self.missing_indices();
        if self.records.is_empty() || !missing.is_empty() {
            return Err(PipelineError::IncompleteFamily {
                family: self.family,
                missing,
            });
        }
        Ok(())
    }

    pub fn records(&self) -> &[A] {
        &self.records
    }

    pub fn referenced_paths(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .flat_map(A::referenced_paths)
            .collect()
    }

    pub fn save(&self) -> Result<()> {
        let mut items = Vec::with_capacity(self.records.len());
        for (i, record) in self.records.iter().enumerate() {
            let masked = record.mask_paths(&self.paths)?;
            let mut value = serde_json::to_value(&masked)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("index".to_string(), serde_json::json!(i + 1));
            }
            items.push(value);
        }
        let document = serde_json::json!({ "assets": items });
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

    fn narrator_ledger(paths: &Arc<ChapterPaths>) -> AssetLedger<NarratorAsset> {
        AssetLedger::load(paths.clone(), paths.narrator_asset_file.clone(), "narrator").unwrap()
    }

    fn write_asset(paths: &ChapterPaths, name: &str) -> PathBuf {
        let file = paths.narrator_asset_folder.join(name);
        std::fs::write(&file, b"x").unwrap();
        file
    }

    #[test]
    fn synchronize_pads_and_truncates() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let mut ledger = narrator_ledger(&paths);

        ledger.synchronize_size_to(3);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.missing_indices(), vec![0, 1, 2]);

        ledger.synchronize_size_to(1);
        assert_eq!(ledger.len(), 1);

        ledger.synchronize_size_to(4);
        assert_eq!(ledger.len(), 4);
    }

    #[test]
    fn set_validates_through_asset_addressing() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let mut ledger = narrator_ledger(&paths);
        ledger.synchronize_size_to(1);

        assert!(matches!(
            ledger.set(0, NarratorAsset::new(PathBuf::from("relative.mp3"))),
            Err(PipelineError::RelativePath(_))
        ));
        let outside = dir.path().join("outside.mp3");
        std::fs::write(&outside, b"x").unwrap();
        assert!(matches!(
            ledger.set(0, NarratorAsset::new(outside)),
            Err(PipelineError::UnknownRoot(_))
        ));

        let inside = write_asset(&paths, "ok.mp3");
        ledger.set(0, NarratorAsset::new(inside)).unwrap();
        assert!(ledger.has(0));
    }

    #[test]
    fn out_of_band_deletion_is_redetected() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let mut ledger = narrator_ledger(&paths);
        ledger.synchronize_size_to(2);

        let first = write_asset(&paths, "a.mp3");
        let second = write_asset(&paths, "b.mp3");
        ledger.set(0, NarratorAsset::new(first.clone())).unwrap();
        ledger.set(1, NarratorAsset::new(second)).unwrap();
        assert!(ledger.is_complete());

        std::fs::remove_file(&first).unwrap();
        assert!(!ledger.has(0));
        assert_eq!(ledger.missing_indices(), vec![0]);
        assert!(!ledger.is_complete());
    }

    #[test]
    fn persisted_length_always_matches_scene_count() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let mut ledger = narrator_ledger(&paths);
        ledger.synchronize_size_to(3);
        let asset = write_asset(&paths, "only.mp3");
        ledger.set(1, NarratorAsset::new(asset)).unwrap();
        ledger.save().unwrap();

        let text = std::fs::read_to_string(&paths.narrator_asset_file).unwrap();
        let document: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["assets"].as_array().unwrap().len(), 3);

        let reloaded = narrator_ledger(&paths);
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.missing_indices(), vec![0, 2]);
    }

    #[test]
    fn corrupted_ledger_is_backed_up_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let original = b"{\"assets\": [broken".to_vec();
        std::fs::write(&paths.narrator_asset_file, &original).unwrap();

        let ledger = narrator_ledger(&paths);

        assert!(ledger.is_empty());
        let backup = paths.narrator_asset_file.with_extension("json.old");
        assert_eq!(std::fs::read(&backup).unwrap(), original);
        // The replacement document is valid and empty.
        let text = std::fs::read_to_string(&paths.narrator_asset_file).unwrap();
        let document: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["assets"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn unresolvable_entry_degrades_to_missing() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        std::fs::write(
            &paths.narrator_asset_file,
            r#"{"assets": [{"index": 1, "narrator_asset": "assets/../../escape.mp3"}]}"#,
        )
        .unwrap();

        let ledger = narrator_ledger(&paths);
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.has(0));
    }

    #[test]
    fn empty_ledger_is_not_complete() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let ledger = narrator_ledger(&paths);
        assert!(!ledger.is_complete());
        assert!(ledger.ensure_complete().is_err());
    }
}
