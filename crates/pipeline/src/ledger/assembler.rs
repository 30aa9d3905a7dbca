use crate::paths::ChapterPaths;
use crate::util::{backup_file_to_old, write_json_document};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AssemblerAssetsDocument {
    video_ending: Option<PathBuf>,
}

/// Chapter-level assembly artifacts that survive reruns: currently the
/// finished ending segment, which is expensive to resynthesize.
pub struct AssemblerAssets {
    paths: Arc<ChapterPaths>,
    file_path: PathBuf,
    video_ending: Option<PathBuf>,
}

impl AssemblerAssets {
    pub fn load(paths: Arc<ChapterPaths>) -> Result<Self> {
        let file_path = paths.assembler_asset_file.clone();
        let mut assets = AssemblerAssets {
            paths,
            file_path,
            video_ending: None,
        };

        let text = match std::fs::read_to_string(&assets.file_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "assembler assets not found: {} - starting empty",
                    assets.file_path.display()
                );
                return Ok(assets);
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<AssemblerAssetsDocument>(&text) {
            Ok(document) => {
                assets.video_ending = document
                    .video_ending
                    .and_then(|masked| assets.paths.unmask(&masked.to_string_lossy()).ok());
            }
            Err(err) => {
                error!(
                    "corrupted assembler assets {}: {err} - backing up and reinitializing",
                    assets.file_path.display()
                );
                backup_file_to_old(&assets.file_path)?;
                assets.video_ending = None;
                assets.save()?;
            }
        }
        Ok(assets)
    }

    /// The persisted ending segment, if it still exists on disk.
    pub fn video_ending(&self) -> Option<&Path> {
        self.video_ending.as_deref().filter(|path| path.is_file())
    }

    pub fn set_video_ending(&mut self, path: PathBuf) -> Result<()> {
        self.video_ending = Some(path);
        self.save()
    }

    pub fn referenced_paths(&self) -> Vec<PathBuf> {
        self.video_ending.iter().cloned().collect()
    }

    pub fn save(&self) -> Result<()> {
        let masked = self
            .video_ending
            .as_ref()
            .map(|path| self.paths.mask(path).map(PathBuf::from))
            .transpose()?;
        let document = serde_json::to_value(AssemblerAssetsDocument {
            video_ending: masked,
        })?;
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
    fn ending_survives_reload_but_requires_its_file() {
        let dir = TempDir::new().unwrap();
        let paths = chapter_paths(&dir);
        let ending = paths.assembler_asset_folder.join("ending.mp4");
        std::fs::write(&ending, b"x").unwrap();

        let mut assets = AssemblerAssets::load(paths.clone()).unwrap();
        assets.set_video_ending(ending.clone()).unwrap();

        let reloaded = AssemblerAssets::load(paths.clone()).unwrap();
        assert_eq!(reloaded.video_ending(), Some(ending.as_path()));

        std::fs::remove_file(&ending).unwrap();
        let reloaded = AssemblerAssets::load(paths).unwrap();
        assert_eq!(reloaded.video_ending(), None);
    }
}
