use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("asset path is not absolute: {0}")]
    RelativePath(PathBuf),

    #[error("asset path is a folder, expected a file: {0}")]
    NotAFile(PathBuf),

    #[error("asset path is not under any known assets folder: {0}")]
    UnknownRoot(PathBuf),

    #[error("masked path does not start with a known root tag: {0}")]
    UnknownMask(String),

    #[error("asset path escapes the {root} folder: {path}")]
    PathEscape { root: &'static str, path: PathBuf },

    #[error("scene index {index} is out of range for {len} scenes")]
    SceneOutOfRange { index: usize, len: usize },

    #[error("{family} assets are incomplete, missing scenes: {missing:?}")]
    IncompleteFamily {
        family: &'static str,
        missing: Vec<usize>,
    },
}
