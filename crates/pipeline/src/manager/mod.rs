pub mod music;
pub mod narrator_image;
pub mod sub_video;

pub use music::BackgroundMusicAssetManager;
pub use narrator_image::NarratorAndImageAssetManager;
pub use sub_video::SubVideoAssetManager;
