// config.rs - Pipeline and job configuration
//
// Jobs are YAML files:
//
//   name: lotus-door
//   background: background/door.jpg
//   foreground: foreground/lotus.png
//   pipeline:
//     fg_scale_relative: 0.25
//     fg_top_left: [0.35, 0.34]
//
// Anything omitted falls back to the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CompositeError, Result};
use crate::lighting::LightFitConfig;

/// Locations of the five ONNX models, relative to `dir` unless absolute
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    pub dir: PathBuf,
    pub depth: PathBuf,
    pub intrinsic: PathBuf,
    pub normals: PathBuf,
    pub albedo: PathBuf,
    pub reshading: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            depth: PathBuf::from("depth.onnx"),
            intrinsic: PathBuf::from("intrinsic.onnx"),
            normals: PathBuf::from("normals.onnx"),
            albedo: PathBuf::from("albedo_harmonizer.onnx"),
            reshading: PathBuf::from("reshading.onnx"),
        }
    }
}

impl ModelPaths {
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() { file.to_path_buf() } else { self.dir.join(file) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest edge of the background canvas and of the foreground crop
    pub max_edge_size: usize,
    /// Foreground size relative to its inference resolution
    pub fg_scale_relative: f32,
    /// Foreground top-left corner as fractions of canvas (height, width)
    pub fg_top_left: [f32; 2],
    pub output_root: PathBuf,
    pub light: LightFitConfig,
    pub models: ModelPaths,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_edge_size: 1024,
            fg_scale_relative: 0.25,
            fg_top_left: [0.35, 0.34],
            output_root: PathBuf::from("output"),
            light: LightFitConfig::default(),
            models: ModelPaths::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_edge_size == 0 {
            return Err(CompositeError::Config("max_edge_size must be positive".into()));
        }
        if !(self.fg_scale_relative > 0.0 && self.fg_scale_relative <= 1.0) {
            return Err(CompositeError::Config(format!(
                "fg_scale_relative must be in (0, 1], got {}",
                self.fg_scale_relative
            )));
        }
        if self.fg_top_left.iter().any(|f| !(0.0..1.0).contains(f)) {
            return Err(CompositeError::Config(format!(
                "fg_top_left fractions must be in [0, 1), got {:?}",
                self.fg_top_left
            )));
        }
        if self.light.max_edge == 0 {
            return Err(CompositeError::Config("light.max_edge must be positive".into()));
        }
        if self.light.min_guide_luminance > self.light.max_guide_luminance {
            return Err(CompositeError::Config("light guide luminance range is empty".into()));
        }
        Ok(())
    }
}

/// One named compositing run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub background: PathBuf,
    /// RGBA cutout, alpha is the foreground mask
    pub foreground: PathBuf,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl JobConfig {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let job: JobConfig = serde_yaml::from_str(contents)?;
        job.validate()?;
        Ok(job)
    }

    /// Load a job file; relative image paths resolve against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let mut job = Self::from_yaml(&fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            for p in [&mut job.background, &mut job.foreground] {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
        Ok(job)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            return Err(CompositeError::Config(format!("invalid job name {:?}", self.name)));
        }
        self.pipeline.validate()
    }

    /// Directory all outputs of this job go to
    pub fn output_dir(&self) -> PathBuf {
        self.pipeline.output_root.join(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_job_uses_defaults() {
        let job = JobConfig::from_yaml("name: lotus-door\nbackground: bg.jpg\nforeground: fg.png\n").unwrap();
        assert_eq!(job.pipeline, PipelineConfig::default());
        assert_eq!(job.output_dir(), PathBuf::from("output/lotus-door"));
    }

    #[test]
    fn partial_overrides() {
        let yaml = "\
name: soap
background: bg.jpg
foreground: fg.png
pipeline:
  fg_scale_relative: 0.5
  light:
    erode_radius: 3
";
        let job = JobConfig::from_yaml(yaml).unwrap();
        assert_eq!(job.pipeline.fg_scale_relative, 0.5);
        assert_eq!(job.pipeline.light.erode_radius, 3);
        assert_eq!(job.pipeline.light.max_edge, 512);
        assert_eq!(job.pipeline.max_edge_size, 1024);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = PipelineConfig::default();
        cfg.fg_top_left = [1.2, 0.0];
        assert!(matches!(cfg.validate(), Err(CompositeError::Config(_))));

        let mut cfg = PipelineConfig::default();
        cfg.fg_scale_relative = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_path_like_names() {
        let err = JobConfig::from_yaml("name: a/b\nbackground: x\nforeground: y\n");
        assert!(matches!(err, Err(CompositeError::Config(_))));
    }

    #[test]
    fn model_paths_resolve_against_dir() {
        let paths = ModelPaths { dir: PathBuf::from("/opt/models"), ..Default::default() };
        assert_eq!(paths.resolve(&paths.depth), PathBuf::from("/opt/models/depth.onnx"));
        assert_eq!(paths.resolve(Path::new("/abs/x.onnx")), PathBuf::from("/abs/x.onnx"));
    }
}
