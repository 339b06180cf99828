/// Explorable image cache converter entry point
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image_cache_pre_processing::compress::compress_outputs;
use image_cache_pre_processing::depth_sort::DepthConvention;
use image_cache_pre_processing::pixel_order::RowOrder;
use image_cache_pre_processing::view_normal::NormalZChannel;
use image_cache_pre_processing::{
    CompositeSpriteConverter, ConversionSummary, PipelineConfig, SortedStackConverter,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "image-cache-pre-processing")]
#[command(about = "Convert captured image cache layers into depth-ordered arrays")]
struct Cli {
    /// Pipeline settings file (JSON); flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode pixel-order sprites and packed capture images
    Sprite {
        /// Dataset root containing config.json
        dataset: PathBuf,

        #[arg(long, value_enum)]
        row_order: Option<RowOrder>,

        #[arg(long, value_enum)]
        normal_z_channel: Option<NormalZChannel>,

        /// Pad stack arrays to a square texture
        #[arg(long)]
        pad: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Sort raw per-layer depth captures into stacks
    DepthSort {
        /// Dataset root containing config.json
        dataset: PathBuf,

        #[arg(long, value_enum)]
        depth_convention: Option<DepthConvention>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Gzip every file declared in a dataset's index.json
    Compress {
        /// Dataset root containing index.json
        dataset: PathBuf,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Also write R8 DDS textures
    #[arg(long)]
    dds: bool,

    /// Gzip outputs once converted
    #[arg(long)]
    compress: bool,
}

impl OutputArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        config.export_dds |= self.dds;
        config.compress |= self.compress;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if cli.threads.is_some() {
        config.threads = cli.threads;
    }

    match config.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?
            .install(|| run(cli.command, config)),
        None => run(cli.command, config),
    }
}

fn run(command: Command, mut config: PipelineConfig) -> Result<()> {
    match command {
        Command::Sprite {
            dataset,
            row_order,
            normal_z_channel,
            pad,
            output,
        } => {
            if let Some(row_order) = row_order {
                config.row_order = row_order;
            }
            if let Some(channel) = normal_z_channel {
                config.normal_z_channel = channel;
            }
            config.pad_to_texture |= pad;
            output.apply(&mut config);

            let converter = CompositeSpriteConverter::new(&dataset, config.clone())
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            let summary = converter.convert()?;
            finish(&dataset, summary, &config)
        }
        Command::DepthSort {
            dataset,
            depth_convention,
            output,
        } => {
            if let Some(convention) = depth_convention {
                config.depth_convention = convention;
            }
            output.apply(&mut config);

            let converter = SortedStackConverter::new(&dataset, config.clone())
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            let summary = converter.convert()?;
            finish(&dataset, summary, &config)
        }
        Command::Compress { dataset } => {
            compress_outputs(&dataset)
                .with_context(|| format!("Failed to compress {}", dataset.display()))?;
            Ok(())
        }
    }
}

fn finish(dataset: &Path, summary: ConversionSummary, config: &PipelineConfig) -> Result<()> {
    if config.compress {
        compress_outputs(dataset)?;
    }

    if !summary.is_success() {
        bail!(
            "{} of {} poses failed",
            summary.failed,
            summary.processed + summary.failed
        );
    }

    info!("Conversion complete!");
    Ok(())
}
