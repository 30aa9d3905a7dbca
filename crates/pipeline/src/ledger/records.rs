use super::AssetRecord;
use crate::error::PipelineError;
use crate::paths::ChapterPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn file_exists(path: &Path) -> bool {
    path.is_file()
}

fn mask_optional(
    path: &Option<PathBuf>,
    paths: &ChapterPaths,
) -> Result<Option<PathBuf>, PipelineError> {
    path.as_ref()
        .map(|p| paths.mask(p).map(PathBuf::from))
        .transpose()
}

fn unmask_optional(
    path: &Option<PathBuf>,
    paths: &ChapterPaths,
) -> Result<Option<PathBuf>, PipelineError> {
    path.as_ref()
        .map(|p| paths.unmask(&p.to_string_lossy()))
        .transpose()
}

macro_rules! path_asset_record {
    ($name:ident, $field:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub $field: Option<PathBuf>,
        }

        impl $name {
            pub fn new(path: PathBuf) -> Self {
                $name {
                    $field: Some(path),
                }
            }

            pub fn path(&self) -> Option<&Path> {
                self.$field.as_deref()
            }
        }

        impl AssetRecord for $name {
            fn is_set(&self) -> bool {
                self.$field.is_some()
            }

            fn is_present(&self) -> bool {
                self.$field.as_deref().map(file_exists).unwrap_or(false)
            }

            fn referenced_paths(&self) -> Vec<PathBuf> {
                self.$field.iter().cloned().collect()
            }

            fn validate(&self, paths: &ChapterPaths) -> Result<(), PipelineError> {
                if let Some(path) = &self.$field {
                    paths.mask(path)?;
                }
                Ok(())
            }

            fn mask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
                Ok($name {
                    $field: mask_optional(&self.$field, paths)?,
                })
            }

            fn unmask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
                Ok($name {
                    $field: unmask_optional(&self.$field, paths)?,
                })
            }
        }
    };
}

path_asset_record!(NarratorAsset, narrator_asset);
path_asset_record!(ImageAsset, image_asset);
path_asset_record!(SubVideoAsset, sub_video_asset);

/// Background-music record: an explicit `skip` counts as present without a
/// file, so silent scenes do not read as missing forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundMusicAsset {
    pub asset: Option<PathBuf>,
    pub volume: f32,
    pub skip: bool,
}

impl BackgroundMusicAsset {
    pub const DEFAULT_VOLUME: f32 = 0.3;

    pub fn new(path: PathBuf) -> Self {
        BackgroundMusicAsset {
            asset: Some(path),
            volume: Self::DEFAULT_VOLUME,
            skip: false,
        }
    }

    pub fn silent() -> Self {
        BackgroundMusicAsset {
            asset: None,
            volume: 0.0,
            skip: true,
        }
    }

    pub fn cue(&self) -> engine::MusicCue {
        engine::MusicCue {
            asset: self.asset.clone(),
            volume: self.volume,
            skip: self.skip,
        }
    }
}

impl Default for BackgroundMusicAsset {
    fn default() -> Self {
        BackgroundMusicAsset {
            asset: None,
            volume: Self::DEFAULT_VOLUME,
            skip: false,
        }
    }
}

impl AssetRecord for BackgroundMusicAsset {
    fn is_set(&self) -> bool {
        self.skip || self.asset.is_some()
    }

    fn is_present(&self) -> bool {
        self.skip || self.asset.as_deref().map(file_exists).unwrap_or(false)
    }

    fn referenced_paths(&self) -> Vec<PathBuf> {
        self.asset.iter().cloned().collect()
    }

    fn validate(&self, paths: &ChapterPaths) -> Result<(), PipelineError> {
        if let Some(path) = &self.asset {
            paths.mask(path)?;
        }
        Ok(())
    }

    fn mask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
        Ok(BackgroundMusicAsset {
            asset: mask_optional(&self.asset, paths)?,
            ..self.clone()
        })
    }

    fn unmask_paths(&self, paths: &ChapterPaths) -> Result<Self, PipelineError> {
        Ok(BackgroundMusicAsset {
            asset: unmask_optional(&self.asset, paths)?,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn skip_record_is_present_without_a_file() {
        let record = BackgroundMusicAsset::silent();
        assert!(record.is_present());
        assert!(record.referenced_paths().is_empty());
    }

    #[test]
    fn music_record_requires_its_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("track.mp3");
        let record = BackgroundMusicAsset::new(file.clone());
        assert!(!record.is_present());

        std::fs::write(&file, b"x").unwrap();
        assert!(record.is_present());
    }

    #[test]
    fn empty_record_is_neither_set_nor_present() {
        let record = NarratorAsset::default();
        assert!(!record.is_set());
        assert!(!record.is_present());
    }
}
