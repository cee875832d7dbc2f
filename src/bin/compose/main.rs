// compose - Intrinsic compositing from the command line
//
// Pipeline:
//   1. Build a job from --job FILE or from BACKGROUND FOREGROUND
//   2. Apply command line overrides
//   3. Load the ONNX models (or the heuristic stand-ins)
//   4. Run the pipeline and write every buffer as PNG
//
// Usage: cargo run --bin compose -- <background> <foreground> [--name N] [--scale F] [--top F] [--left F]
//        cargo run --bin compose -- --job jobs/lotus-door.yaml --backend heuristic

mod args;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use intrinsic_composite::export::stem;
use intrinsic_composite::{CompositeError, HeuristicModels, IntrinsicModels, JobConfig, OnnxModels, Result, run_job};

use args::{Backend, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::setup_logging(if cli.verbose { "debug" } else { "info" });

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let job = build_job(cli)?;

    let mut models: Box<dyn IntrinsicModels> = match cli.backend {
        Backend::Onnx => {
            info!(dir = %job.pipeline.models.dir.display(), "loading models");
            Box::new(OnnxModels::load(&job.pipeline.models)?)
        }
        Backend::Heuristic => Box::new(HeuristicModels::default()),
    };

    let dir = run_job(models.as_mut(), &job)?;
    println!("{}", dir.display());
    Ok(())
}

fn build_job(cli: &Cli) -> Result<JobConfig> {
    let mut job = match (&cli.job, &cli.background, &cli.foreground) {
        (Some(path), _, _) => JobConfig::load(path)?,
        (None, Some(bg), Some(fg)) => JobConfig {
            name: format!("{}_{}", stem(bg), stem(fg)),
            background: bg.clone(),
            foreground: fg.clone(),
            pipeline: Default::default(),
        },
        _ => return Err(CompositeError::Config("need --job or BACKGROUND FOREGROUND".into())),
    };

    if let Some(name) = &cli.name {
        job.name = name.clone();
    }
    let cfg = &mut job.pipeline;
    if let Some(out) = &cli.out {
        cfg.output_root = out.clone();
    }
    if let Some(dir) = &cli.models {
        cfg.models.dir = dir.clone();
    }
    if let Some(scale) = cli.scale {
        cfg.fg_scale_relative = scale;
    }
    if let Some(top) = cli.top {
        cfg.fg_top_left[0] = top;
    }
    if let Some(left) = cli.left {
        cfg.fg_top_left[1] = left;
    }
    if let Some(max_edge) = cli.max_edge {
        cfg.max_edge_size = max_edge;
    }

    job.validate()?;
    Ok(job)
}
