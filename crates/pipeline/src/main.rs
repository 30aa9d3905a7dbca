use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use engine::GapFill;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;

use pipeline::assembler::VideoAssembler;
use pipeline::builder::{
    build_assembler_recipe, BackgroundMusicRecipeBuilder, ImageRecipeBuilder,
    NarratorRecipeBuilder, SubVideoRecipeBuilder,
};
use pipeline::comfy::RemoteClient;
use pipeline::config::{default_assets_folder, RemoteConfig};
use pipeline::gc::clean_unused_assets;
use pipeline::generators::remote::{
    FluxImageGenerator, MusicGenGenerator, WanClipGenerator, ZonosTtsGenerator,
};
use pipeline::generators::GeneratorSet;
use pipeline::manager::{
    BackgroundMusicAssetManager, NarratorAndImageAssetManager, SubVideoAssetManager,
};
use pipeline::media::FfmpegCompositor;
use pipeline::paths::ChapterPaths;
use pipeline::recipe::image::AspectRatio;
use pipeline::script::TemplateScriptGenerator;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GapFillArg {
    Freeze,
    Reverse,
}

impl From<GapFillArg> for GapFill {
    fn from(arg: GapFillArg) -> Self {
        match arg {
            GapFillArg::Freeze => GapFill::FreezeLastFrame,
            GapFillArg::Reverse => GapFill::ReverseReplay,
        }
    }
}

#[derive(Parser)]
#[command(name = "pipeline", about = "Declarative, resumable video generation pipeline")]
struct Cli {
    /// User folder holding stories and user assets
    #[arg(long)]
    user_folder: PathBuf,

    /// Story name under <user-folder>/stories/
    #[arg(long)]
    story: String,

    /// Zero-based chapter index
    #[arg(long)]
    chapter: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build narrator, image, music and assembler recipes from the prompts
    Recipes {
        #[arg(long, value_enum, default_value = "landscape")]
        aspect_ratio: AspectRatio,
    },
    /// Generate missing narration and image assets
    Generate,
    /// Clear one scene's narration and image and generate them again
    Regenerate {
        /// Zero-based scene index
        #[arg(long)]
        scene: usize,
    },
    /// Generate missing background music assets
    Music,
    /// Build sub-video recipes from narration durations and scene scripts
    SubVideoRecipes {
        #[arg(long, value_enum, default_value = "landscape")]
        aspect_ratio: AspectRatio,
    },
    /// Generate missing sub-video assets
    SubVideos,
    /// Assemble the chapter video from completed ledgers
    Assemble {
        #[arg(long, value_enum, default_value = "freeze")]
        gap_fill: GapFillArg,
    },
    /// Delete generated files no ledger references anymore
    Gc,
}

fn generator_set(client: Arc<RemoteClient>) -> Arc<GeneratorSet> {
    Arc::new(GeneratorSet {
        zonos_tts: Arc::new(ZonosTtsGenerator::new(client.clone())),
        flux_image: Arc::new(FluxImageGenerator::new(client.clone())),
        music_gen: Arc::new(MusicGenGenerator::new(client.clone())),
        wan_video: Arc::new(WanClipGenerator::new(client)),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    let cli = Cli::parse();
    let paths = Arc::new(ChapterPaths::new(
        &cli.user_folder,
        &cli.story,
        cli.chapter,
        &default_assets_folder(),
    )?);

    let client = Arc::new(RemoteClient::new(RemoteConfig::from_env()));
    let compositor = Arc::new(FfmpegCompositor);

    match cli.command {
        Command::Recipes { aspect_ratio } => {
            NarratorRecipeBuilder::new(paths.clone()).build()?;
            ImageRecipeBuilder::new(paths.clone(), aspect_ratio).build()?;
            BackgroundMusicRecipeBuilder::new(paths.clone()).build()?;
            build_assembler_recipe(paths)?;
        }
        Command::Generate => {
            let mut manager =
                NarratorAndImageAssetManager::new(paths, generator_set(client))?;
            manager.generate_assets().await?;
        }
        Command::Regenerate { scene } => {
            let mut manager =
                NarratorAndImageAssetManager::new(paths, generator_set(client))?;
            manager.regenerate_scene(scene).await?;
        }
        Command::Music => {
            let mut manager = BackgroundMusicAssetManager::new(paths, generator_set(client))?;
            manager.generate_assets().await?;
        }
        Command::SubVideoRecipes { aspect_ratio } => {
            let builder = SubVideoRecipeBuilder::new(
                paths,
                compositor,
                Arc::new(TemplateScriptGenerator),
            );
            builder.build(aspect_ratio).await?;
        }
        Command::SubVideos => {
            let mut manager =
                SubVideoAssetManager::new(paths, generator_set(client), compositor)?;
            manager.generate_assets().await?;
        }
        Command::Assemble { gap_fill } => {
            let speech = Arc::new(ZonosTtsGenerator::new(client));
            let mut assembler =
                VideoAssembler::new(paths, compositor, speech, None, gap_fill.into())?;
            let output = assembler.assemble().await?;
            println!("{}", output.display());
        }
        Command::Gc => {
            let removed = clean_unused_assets(paths)?;
            println!("removed {removed} unused file(s)");
        }
    }

    Ok(())
}
