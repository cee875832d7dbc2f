// args.rs - Command line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// ONNX Runtime models from --models
    #[default]
    Onnx,
    /// Model-free stand-ins (fast, for previews and testing)
    Heuristic,
}

#[derive(Parser, Debug)]
#[command(name = "compose")]
#[command(version, about = "Composite a cutout onto a background with intrinsic harmonization", long_about = None)]
pub struct Cli {
    /// Background image
    #[arg(value_name = "BACKGROUND", required_unless_present = "job")]
    pub background: Option<PathBuf>,

    /// Foreground cutout (RGBA, alpha is the mask)
    #[arg(value_name = "FOREGROUND", required_unless_present = "job")]
    pub foreground: Option<PathBuf>,

    /// YAML job file (name, images, pipeline settings)
    #[arg(long, value_name = "FILE", conflicts_with_all = ["background", "foreground"])]
    pub job: Option<PathBuf>,

    /// Job name, outputs go to <out>/<name>
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Output root directory
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Inference backend
    #[arg(long, value_enum, default_value_t = Backend::Onnx)]
    pub backend: Backend,

    /// Directory holding the ONNX models
    #[arg(long, value_name = "DIR")]
    pub models: Option<PathBuf>,

    /// Foreground size relative to its inference resolution
    #[arg(long, value_name = "FLOAT")]
    pub scale: Option<f32>,

    /// Foreground top edge as a fraction of the canvas height
    #[arg(long, value_name = "FLOAT")]
    pub top: Option<f32>,

    /// Foreground left edge as a fraction of the canvas width
    #[arg(long, value_name = "FLOAT")]
    pub left: Option<f32>,

    /// Longest edge of the working canvas
    #[arg(long, value_name = "PIXELS")]
    pub max_edge: Option<usize>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
