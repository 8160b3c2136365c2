use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use newsclip::core::margins::detect_margins;
use newsclip::pipeline::{self, PipelineConfig};
use newsclip::raster::{Jp2Decoder, RasterDecoder, SourceDecoder, SourceFormat};

#[derive(Parser, Debug)]
#[command(name = "newsclip")]
#[command(version, about = "Cut newspaper articles out of scanned pages using articles XML clips", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crop, regroup and stack every article of every issue under ROOT
    Run {
        /// Directory holding one subdirectory per issue
        root: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "newsclip_output")]
        output: PathBuf,

        /// Worker count (default: available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Pixels added around every crop window
        #[arg(long, default_value_t = 5)]
        padding: u32,

        /// Scale of the page images relative to the layout, in percent
        #[arg(long, default_value_t = 100)]
        scale: u32,

        /// Subtract detected right and bottom page margins before mapping
        #[arg(long)]
        detect_margins: bool,

        /// Guess article titles with tesseract
        #[arg(long)]
        titles: bool,

        /// Path to the opj_decompress binary
        #[arg(long)]
        jp2_program: Option<PathBuf>,
    },

    /// Only resolve rectangles and write crop_queue.json / articles.json
    Assemble {
        /// Directory holding one subdirectory per issue
        root: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "newsclip_output")]
        output: PathBuf,
    },

    /// Print the shape and detected margins of one page image
    Inspect {
        /// Page image (.jpg, .jpeg or .jp2)
        image: PathBuf,
    },
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            root,
            output,
            workers,
            padding,
            scale,
            detect_margins,
            titles,
            jp2_program,
        } => {
            check_root(&root)?;
            let mut config = PipelineConfig::new(root, output)
                .with_padding(padding)
                .with_scale_percent(scale)
                .with_detect_margins(detect_margins)
                .with_titles(titles);
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            if let Some(program) = jp2_program {
                config = config.with_jp2_program(program);
            }
            let summary = pipeline::run(&config)?;
            println!(
                "{} issues, {} rects ({} cropped, {} skipped), {} articles, {} composites",
                summary.issues,
                summary.rects,
                summary.crops.written,
                summary.crops.skipped,
                summary.articles,
                summary.composites
            );
            println!("Results saved to: {}", config.output.display());
            Ok(())
        }
        Commands::Assemble { root, output } => {
            check_root(&root)?;
            let config = PipelineConfig::new(root, output);
            let assembly = pipeline::assemble(&config)?;
            info!(
                rects = assembly.records().len(),
                articles = assembly.articles().len(),
                output = %config.output.display(),
                "wrote assembly"
            );
            Ok(())
        }
        Commands::Inspect { image } => inspect(&image),
    }
}

fn check_root(root: &Path) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Input root is not a directory: {}", root.display());
    }
    Ok(())
}

fn inspect(image: &Path) -> Result<()> {
    let format = SourceFormat::from_path(image)?;
    let work_dir = std::env::temp_dir().join("newsclip-inspect");
    let raster = SourceDecoder::new(Jp2Decoder::new(work_dir))
        .decode(image)
        .with_context(|| format!("Failed to open image: {}", image.display()))?;
    let shape = raster.shape();

    println!("Image Information");
    println!("=================");
    println!("File: {}", image.display());
    println!("Format: {format:?}");
    match shape.channels {
        None => println!("Shape: {} x {}", shape.height, shape.width),
        Some(channels) => println!("Shape: {} x {} x {}", shape.height, shape.width, channels),
    }
    match raster.gray() {
        Some(gray) => {
            let margins = detect_margins(&gray);
            println!(
                "Margins: top {}, right {}, bottom {}, left {}",
                margins.top, margins.right, margins.bottom, margins.left
            );
        }
        None => println!("Margins: n/a (colour image)"),
    }
    Ok(())
}
