use crate::error::PipelineError;
use std::path::{Component, Path, PathBuf};

pub const STORY_ASSETS_MASK: &str = "assets";
pub const USER_ASSETS_MASK: &str = "user_assets";
pub const DEFAULT_ASSETS_MASK: &str = "default_assets";

/// Folder layout and path masking for one chapter of one story.
///
/// Constructed once per chapter and passed by reference to every component
/// that persists or resolves asset locations. Persisted documents never
/// contain absolute paths; they store `<root-tag>/<relative>` masked forms
/// over a closed set of three roots.
#[derive(Debug, Clone)]
pub struct ChapterPaths {
    pub user_folder: PathBuf,
    pub story_folder: PathBuf,
    pub chapter_index: usize,

    pub chapter_prompt_path: PathBuf,
    pub video_chapter_folder: PathBuf,
    pub story_assets_folder: PathBuf,

    pub narrator_asset_folder: PathBuf,
    pub image_asset_folder: PathBuf,
    pub sub_video_asset_folder: PathBuf,
    pub background_music_asset_folder: PathBuf,
    pub assembler_asset_folder: PathBuf,

    pub narrator_recipe_file: PathBuf,
    pub image_recipe_file: PathBuf,
    pub sub_video_recipe_file: PathBuf,
    pub background_music_recipe_file: PathBuf,
    pub assembler_recipe_file: PathBuf,

    pub narrator_asset_file: PathBuf,
    pub image_asset_file: PathBuf,
    pub sub_video_asset_file: PathBuf,
    pub background_music_asset_file: PathBuf,
    pub assembler_asset_file: PathBuf,

    pub video_output_file: PathBuf,

    default_assets_folder: PathBuf,
}

impl ChapterPaths {
    pub fn new(
        user_folder: &Path,
        story_name: &str,
        chapter_index: usize,
        default_assets_folder: &Path,
    ) -> std::io::Result<Self> {
        let story_folder = user_folder.join("stories").join(story_name);
        let chapter_tag = format!("chapter_{:03}", chapter_index + 1);

        let chapter_prompt_path = story_folder
            .join("prompts")
            .join(format!("{chapter_tag}.json"));
        let video_chapter_folder = story_folder.join("videos").join(&chapter_tag);
        let story_assets_folder = video_chapter_folder.join("assets");

        let narrator_asset_folder = story_assets_folder.join("narrators");
        let image_asset_folder = story_assets_folder.join("images");
        let sub_video_asset_folder = story_assets_folder.join("sub_videos");
        let background_music_asset_folder = story_assets_folder.join("background_music");
        let assembler_asset_folder = story_assets_folder.join("assembler");

        for folder in [
            &narrator_asset_folder,
            &image_asset_folder,
            &sub_video_asset_folder,
            &background_music_asset_folder,
            &assembler_asset_folder,
        ] {
            std::fs::create_dir_all(folder)?;
        }

        Ok(ChapterPaths {
            user_folder: user_folder.to_path_buf(),
            chapter_index,
            chapter_prompt_path,
            narrator_recipe_file: video_chapter_folder.join("narrator_recipe.json"),
            image_recipe_file: video_chapter_folder.join("image_recipe.json"),
            sub_video_recipe_file: video_chapter_folder.join("sub_video_recipe.json"),
            background_music_recipe_file: video_chapter_folder.join("background_music_recipe.json"),
            assembler_recipe_file: video_chapter_folder.join("assembler_recipe.json"),
            narrator_asset_file: video_chapter_folder.join("narrator_assets.json"),
            image_asset_file: video_chapter_folder.join("image_assets.json"),
            sub_video_asset_file: video_chapter_folder.join("sub_video_assets.json"),
            background_music_asset_file: video_chapter_folder.join("background_music_assets.json"),
            assembler_asset_file: video_chapter_folder.join("assembler_assets.json"),
            video_output_file: video_chapter_folder.join(format!("video_{chapter_tag}.mp4")),
            story_folder,
            video_chapter_folder,
            story_assets_folder,
            narrator_asset_folder,
            image_asset_folder,
            sub_video_asset_folder,
            background_music_asset_folder,
            assembler_asset_folder,
            default_assets_folder: default_assets_folder.to_path_buf(),
        })
    }

    pub fn chapter_tag(&self) -> String {
        format!("chapter_{:03}", self.chapter_index + 1)
    }

    /// Deterministic output name for one scene's artifact of one family,
    /// e.g. `chapter_001_narrator_002`.
    pub fn scene_output_name(&self, family: &str, scene_index: usize) -> String {
        format!("{}_{}_{:03}", self.chapter_tag(), family, scene_index + 1)
    }

    pub fn user_assets_folder(&self) -> PathBuf {
        self.user_folder.join("user_assets")
    }

    pub fn default_assets_folder(&self) -> &Path {
        &self.default_assets_folder
    }

    fn roots(&self) -> [(&'static str, PathBuf); 3] {
        [
            (STORY_ASSETS_MASK, self.story_assets_folder.clone()),
            (USER_ASSETS_MASK, self.user_assets_folder()),
            (DEFAULT_ASSETS_MASK, self.default_assets_folder.clone()),
        ]
    }

    /// Encode an absolute asset path as `<root-tag>/<relative>`.
    pub fn mask(&self, asset_path: &Path) -> Result<String, PipelineError> {
        if !asset_path.is_absolute() {
            return Err(PipelineError::RelativePath(asset_path.to_path_buf()));
        }
        if asset_path.is_dir() {
            return Err(PipelineError::NotAFile(asset_path.to_path_buf()));
        }

        for (tag, root) in self.roots() {
            if let Ok(relative) = asset_path.strip_prefix(&root) {
                return Ok(format!("{}/{}", tag, relative.display()));
            }
        }
        Err(PipelineError::UnknownRoot(asset_path.to_path_buf()))
    }

    /// Resolve a masked path back to an absolute one, rejecting unknown
    /// tags and anything that would escape the claimed root. Traversal is
    /// checked even though `mask` never produces it, since the persisted
    /// string may have been hand-edited.
    pub fn unmask(&self, masked: &str) -> Result<PathBuf, PipelineError> {
        let masked_path = Path::new(masked);
        if masked_path.is_absolute() {
            return Err(PipelineError::UnknownMask(masked.to_string()));
        }

        let mut components = masked_path.components();
        let tag = match components.next() {
            Some(Component::Normal(tag)) => tag.to_string_lossy().to_string(),
            _ => return Err(PipelineError::UnknownMask(masked.to_string())),
        };
        let remainder = components.as_path();

        let (root_tag, root) = self
            .roots()
            .into_iter()
            .find(|(candidate, _)| *candidate == tag)
            .ok_or_else(|| PipelineError::UnknownMask(masked.to_string()))?;

        let relative = normalize_relative(remainder).ok_or(PipelineError::PathEscape {
            root: root_tag,
            path: masked_path.to_path_buf(),
        })?;
        if relative.as_os_str().is_empty() {
            return Err(PipelineError::NotAFile(root));
        }

        let resolved = root.join(relative);
        if !resolved.starts_with(&root) {
            return Err(PipelineError::PathEscape {
                root: root_tag,
                path: resolved,
            });
        }
        Ok(resolved)
    }
}

/// Lexically normalize a relative path; `None` when a `..` component would
/// climb above the starting point.
fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part.to_os_string()),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.iter().collect())
}
