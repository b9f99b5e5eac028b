//! CLI for landmark shape normalization and piecewise-affine warping.
//!
//! Usage:
//!   shapewarp train --annotations a.json b.json --model mean.bin
//!   shapewarp warp --image face.png --annotations face.json \
//!       --model mean.bin -o warped.png
//!   shapewarp warp ... --draw               # overlay mesh edges instead
//!   shapewarp warp ... --json               # alignment summary as JSON
//!
//! Annotation files carry the ordered landmarks and the detector boxes:
//!
//! ```json
//! {
//!   "landmarks": { "points": [{ "x": 30.0, "y": 30.0 }, { "x": 60.0, "y": 30.0 }] },
//!   "boxes": [{ "x": 20.0, "y": 20.0, "width": 60.0, "height": 60.0 }]
//! }
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use shapewarp::{
    AlignStage, Annotation, FrameConfig, GrayImage, ImageAccess, MeanShape, Pipeline,
    Sample, ShapeAligner, WarpStage, Warper,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shapewarp")]
#[command(author, version, about = "Landmark shape normalization and warping", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Learn a canonical mean shape from annotated samples
    Train(TrainArgs),
    /// Align one sample and warp it into the canonical frame
    Warp(WarpArgs),
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Annotation files (JSON documents with landmarks and boxes)
    #[arg(required = true)]
    annotations: Vec<PathBuf>,

    /// Output model file
    #[arg(short, long, default_value = "mean_shape.bin")]
    model: PathBuf,

    /// Canonical-frame scale constant
    #[arg(long, default_value_t = FrameConfig::DEFAULT_SCALE)]
    scale: f32,

    /// Canonical-frame origin offset
    #[arg(long, default_value_t = FrameConfig::DEFAULT_OFFSET)]
    offset: f32,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct WarpArgs {
    /// Input image file
    #[arg(long)]
    image: PathBuf,

    /// Annotation file for the image
    #[arg(long)]
    annotations: PathBuf,

    /// Trained mean-shape model
    #[arg(long, default_value = "mean_shape.bin")]
    model: PathBuf,

    /// Output image file
    #[arg(short, long, default_value = "warped.png")]
    output: PathBuf,

    /// Overlay triangle edges on the source instead of warping
    #[arg(long)]
    draw: bool,

    /// Print the alignment summary as JSON
    #[arg(long)]
    json: bool,

    /// Canonical-frame scale constant
    #[arg(long, default_value_t = FrameConfig::DEFAULT_SCALE)]
    scale: f32,

    /// Canonical-frame origin offset
    #[arg(long, default_value_t = FrameConfig::DEFAULT_OFFSET)]
    offset: f32,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Alignment summary for JSON output
#[derive(Serialize)]
struct Summary {
    image: String,
    width: u32,
    height: u32,
    rotation: [[f32; 2]; 2],
    translation: [f32; 2],
    norm: f32,
    output: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = match &args.command {
        Command::Train(train_args) => train(train_args),
        Command::Warp(warp_args) => warp(warp_args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_annotation(path: &PathBuf) -> Result<Annotation, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let annotation: Annotation = serde_json::from_str(&text)?;
    Ok(annotation)
}

fn train(args: &TrainArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = FrameConfig::new(args.scale, args.offset)?;
    let aligner = ShapeAligner::new(config)?;

    let mut corpus = Vec::with_capacity(args.annotations.len());
    for path in &args.annotations {
        if args.verbose {
            eprintln!("Loading annotations from {:?}...", path);
        }
        corpus.push(load_annotation(path)?);
    }

    let mean = aligner.train(&corpus)?;
    mean.save(&args.model)?;

    if args.verbose {
        eprintln!(
            "Trained mean shape with {} points from {} samples",
            mean.len(),
            corpus.len()
        );
    }
    println!("Model written to {:?}", args.model);
    Ok(())
}

fn warp(args: &WarpArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = FrameConfig::new(args.scale, args.offset)?;

    if args.verbose {
        eprintln!("Loading model from {:?}...", args.model);
    }
    let mean = MeanShape::load(&args.model)?;

    if args.verbose {
        eprintln!("Loading image {:?}...", args.image);
    }
    let img = image::open(&args.image)?;
    let gray_img = img.to_luma8();
    let (width, height) = gray_img.dimensions();
    let gray = GrayImage::new(gray_img.to_vec(), width, height);

    let annotation = load_annotation(&args.annotations)?;

    let aligner = ShapeAligner::new(config)?;
    let warper = Warper::new(config)?;
    let pipeline = Pipeline::new()
        .with_stage(AlignStage::new(aligner, mean))
        .with_stage(WarpStage::new(warper).with_draw(args.draw));

    let id = args.image.display().to_string();
    let result = pipeline.run(Sample::new(id.clone(), gray, annotation))?;

    let buffer = image::GrayImage::from_raw(
        result.image.width(),
        result.image.height(),
        result.image.clone().into_raw(),
    )
    .ok_or("output buffer size mismatch")?;
    buffer.save(&args.output)?;

    if let Some(params) = result.alignment {
        let summary = Summary {
            image: id,
            width,
            height,
            rotation: params.rotation,
            translation: [params.translation.x, params.translation.y],
            norm: params.norm,
            output: args.output.display().to_string(),
        };
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
        println!(
            "Image: {} ({}x{})",
            summary.image, summary.width, summary.height
        );
        println!(
            "Rotation: [[{:.4}, {:.4}], [{:.4}, {:.4}]]",
            summary.rotation[0][0],
            summary.rotation[0][1],
            summary.rotation[1][0],
            summary.rotation[1][1]
        );
        println!(
            "Translation: ({:.2}, {:.2})  Norm: {:.2}",
            summary.translation[0], summary.translation[1], summary.norm
        );
    }
    println!("Output written to {:?}", args.output);

    Ok(())
}
