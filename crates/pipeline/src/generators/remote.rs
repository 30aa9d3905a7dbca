use super::{ClipGenerator, MusicGenerator, SpeechGenerator, StillImageGenerator};
use crate::comfy::RemoteClient;
use crate::recipe::{ClipRecipe, ImageRecipe, MusicRecipe, NarratorRecipe};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rename the first produced file onto the requested stem, keeping the
/// extension the back-end chose.
fn adopt_first_output(outputs: Vec<PathBuf>, output: &Path) -> Result<PathBuf> {
    let produced = outputs
        .into_iter()
        .next()
        .context("remote job returned no files")?;
    let mut target = output.to_path_buf();
    if let Some(extension) = produced.extension() {
        target.set_extension(extension);
    }
    if produced != target {
        std::fs::rename(&produced, &target)
            .with_context(|| format!("failed to place artifact at {}", target.display()))?;
    }
    Ok(target)
}

fn output_folder(output: &Path) -> Result<&Path> {
    output
        .parent()
        .context("output path has no parent folder")
}

pub struct ZonosTtsGenerator {
    client: Arc<RemoteClient>,
}

impl ZonosTtsGenerator {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        ZonosTtsGenerator { client }
    }
}

#[async_trait]
impl SpeechGenerator for ZonosTtsGenerator {
    async fn clone_text_to_speech(
        &self,
        recipe: &NarratorRecipe,
        output: &Path,
    ) -> Result<PathBuf> {
        let NarratorRecipe::ZonosTts {
            prompt,
            seed,
            clone_voice_path,
        } = recipe;
        let workflow = serde_json::json!({
            "tts": {
                "class_type": "ZonosTTS",
                "inputs": {
                    "text": prompt,
                    "seed": seed,
                    "reference_audio": clone_voice_path.to_string_lossy(),
                }
            }
        });
        let outputs = self
            .client
            .run_workflow(&workflow, output_folder(output)?)
            .await?;
        adopt_first_output(outputs, output)
    }
}

pub struct FluxImageGenerator {
    client: Arc<RemoteClient>,
}

impl FluxImageGenerator {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        FluxImageGenerator { client }
    }
}

#[async_trait]
impl StillImageGenerator for FluxImageGenerator {
    async fn text_to_image(&self, recipe: &ImageRecipe, output: &Path) -> Result<PathBuf> {
        let ImageRecipe::Flux {
            prompt,
            seed,
            width,
            height,
        } = recipe;
        let workflow = serde_json::json!({
            "sampler": {
                "class_type": "FluxSampler",
                "inputs": {
                    "prompt": prompt,
                    "seed": seed,
                    "width": width,
                    "height": height,
                }
            }
        });
        let outputs = self
            .client
            .run_workflow(&workflow, output_folder(output)?)
            .await?;
        adopt_first_output(outputs, output)
    }
}

pub struct MusicGenGenerator {
    client: Arc<RemoteClient>,
    pub track_seconds: u32,
}

impl MusicGenGenerator {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        MusicGenGenerator {
            client,
            track_seconds: 30,
        }
    }
}

#[async_trait]
impl MusicGenerator for MusicGenGenerator {
    async fn text_to_music(&self, recipe: &MusicRecipe, output: &Path) -> Result<PathBuf> {
        let MusicRecipe::MusicGen { prompt, seed, .. } = recipe;
        let workflow = serde_json::json!({
            "musicgen": {
                "class_type": "MusicGen",
                "inputs": {
                    "prompt": prompt,
                    "seed": seed,
                    "seconds": self.track_seconds,
                }
            }
        });
        let outputs = self
            .client
            .run_workflow(&workflow, output_folder(output)?)
            .await?;
        adopt_first_output(outputs, output)
    }
}

pub struct WanClipGenerator {
    client: Arc<RemoteClient>,
    pub frames_per_clip: u32,
}

impl WanClipGenerator {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        WanClipGenerator {
            client,
            frames_per_clip: 81,
        }
    }
}

#[async_trait]
impl ClipGenerator for WanClipGenerator {
    async fn generate_clip(&self, recipe: &ClipRecipe, output: &Path) -> Result<PathBuf> {
        let workflow = match recipe {
            ClipRecipe::WanT2v {
                prompt,
                seed,
                width,
                height,
            } => serde_json::json!({
                "wan": {
                    "class_type": "WanTextToVideo",
                    "inputs": {
                        "prompt": prompt,
                        "seed": seed,
                        "width": width,
                        "height": height,
                        "frames": self.frames_per_clip,
                    }
                }
            }),
            ClipRecipe::WanI2v {
                prompt,
                seed,
                width,
                height,
                media_path,
            } => {
                let Some(media_path) = media_path else {
                    bail!("image-to-video recipe has no source image");
                };
                serde_json::json!({
                    "wan": {
                        "class_type": "WanImageToVideo",
                        "inputs": {
                            "prompt": prompt,
                            "seed": seed,
                            "width": width,
                            "height": height,
                            "frames": self.frames_per_clip,
                            "image": media_path.to_string_lossy(),
                        }
                    }
                })
            }
        };
        let outputs = self
            .client
            .run_workflow(&workflow, output_folder(output)?)
            .await?;
        adopt_first_output(outputs, output)
    }
}
