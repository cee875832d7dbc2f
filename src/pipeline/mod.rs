// pipeline - End-to-end intrinsic compositing
//
// Pipeline:
//   1. Resize the background, crop and rescale the foreground cutout
//   2. Depth, intrinsic decomposition and normals for both
//   3. Rescale foreground buffers to placement size and composite them
//   4. Harmonize albedo
//   5. Fit light coefficients on a downsampled background
//   6. Reshade
//
// Stages run in sequence and never mutate an earlier stage's buffers.

use std::path::PathBuf;

use tracing::info;

use crate::buffer::{ImageBuffer, Quantity, fit_max_edge};
use crate::composite::{Compositor, Placement};
use crate::config::{JobConfig, PipelineConfig};
use crate::error::Result;
use crate::export::{JobWriter, stem};
use crate::harmonize::{Harmonized, harmonize_albedo};
use crate::lighting::{LightFit, fit_light};
use crate::mask::{ForegroundCrop, crop_and_rescale};
use crate::models::{Decomposition, IntrinsicModels, Reshading, decompose, estimate_depth, estimate_normals};
use crate::reshade::{ReshadingInputs, reshade};

/// Every intermediate and final buffer of one run
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub background: ImageBuffer,
    pub bg_depth: ImageBuffer,
    pub bg_decomposition: Decomposition,
    pub bg_normals: ImageBuffer,

    pub fg_crop: ForegroundCrop,
    pub fg_decomposition: Decomposition,

    pub placement: Placement,
    pub full_mask: ImageBuffer,
    pub full_depth: ImageBuffer,

    pub composite: ImageBuffer,
    pub comp_depth: ImageBuffer,
    pub comp_inv_shading: ImageBuffer,
    pub comp_normals: ImageBuffer,

    pub harmonized: Harmonized,
    pub light: LightFit,
    pub result: Reshading,
}

/// Composite `fg_image` (cut out by `fg_mask`) onto `background` and
/// harmonize the result. Both images are gamma-encoded color.
pub fn run<M: IntrinsicModels + ?Sized>(
    models: &mut M,
    cfg: &PipelineConfig,
    background: &ImageBuffer,
    fg_image: &ImageBuffer,
    fg_mask: &ImageBuffer,
) -> Result<PipelineOutput> {
    cfg.validate()?;
    background.require_quantity("pipeline", Quantity::Color)?;
    fg_image.require_quantity("pipeline", Quantity::Color)?;

    // Background and foreground preparation
    let bg = background.resize_to_max_edge(cfg.max_edge_size);
    let (bg_h, bg_w) = (bg.height(), bg.width());
    info!(
        original = %background.dims(),
        rescaled = %bg.dims(),
        "prepared background"
    );

    let fg_crop = crop_and_rescale(fg_image, fg_mask, cfg.max_edge_size)?;
    info!(bbox = ?fg_crop.bbox, crop = %fg_crop.image.dims(), "prepared foreground");

    // Per-image inference
    info!("estimating depth");
    let bg_depth = estimate_depth(models, &bg)?;
    let fg_depth = estimate_depth(models, &fg_crop.image)?;

    info!("computing shading and albedo");
    let bg_decomposition = decompose(models, &bg.to_linear()?)?;
    let fg_decomposition = decompose(models, &fg_crop.image.to_linear()?)?;

    info!("estimating normals");
    let bg_normals = estimate_normals(models, &bg)?;
    let fg_normals = estimate_normals(models, &fg_crop.image)?;

    // Rescale foreground buffers to their placement size
    let fg_h = ((fg_crop.image.height() as f32 * cfg.fg_scale_relative) as usize).max(1);
    let fg_w = ((fg_crop.image.width() as f32 * cfg.fg_scale_relative) as usize).max(1);
    let fg_image_small = fg_crop.image.resize(fg_h, fg_w);
    let fg_mask_small = fg_crop.mask.resize(fg_h, fg_w);
    let fg_depth_small = fg_depth.resize(fg_h, fg_w);
    let fg_inv_small = fg_decomposition.inv_shading.resize(fg_h, fg_w);
    let fg_normals_small = fg_normals.resize(fg_h, fg_w);

    let placement = Placement::from_relative(cfg.fg_top_left, bg_h, bg_w);
    info!(top = placement.top, left = placement.left, height = fg_h, width = fg_w, "compositing");

    let compositor = Compositor::new(placement, &fg_mask_small)?;
    let full_mask = compositor.full_mask(bg_h, bg_w)?;
    let full_depth = compositor.full(&fg_depth_small, bg_h, bg_w)?;

    let composite = compositor.blend(&bg, &fg_image_small)?;
    let comp_depth = compositor.blend(&bg_depth, &fg_depth_small)?;
    let comp_inv_shading = compositor.blend(&bg_decomposition.inv_shading, &fg_inv_small)?;
    let comp_normals = compositor.blend(&bg_normals, &fg_normals_small)?;

    // Albedo harmonization
    let harmonized = harmonize_albedo(models, &composite, &full_mask, &comp_inv_shading)?;

    // Lighting from a reduced background, normals re-estimated at that size
    let (small_h, small_w) = if bg_h.max(bg_w) > cfg.light.max_edge {
        fit_max_edge(bg_h, bg_w, cfg.light.max_edge)
    } else {
        (bg_h, bg_w)
    };
    info!(height = small_h, width = small_w, "estimating light coefficients");
    let small_bg = bg.resize(small_h, small_w);
    let small_normals = estimate_normals(models, &small_bg)?;
    let small_inv = bg_decomposition.inv_shading.resize(small_h, small_w);
    let light = fit_light(&small_inv, &small_normals, &small_bg, &cfg.light)?;

    // Reshading
    let result = reshade(
        models,
        &ReshadingInputs {
            composite: &harmonized.composite,
            mask: &full_mask,
            inv_shading: &comp_inv_shading,
            depth: &comp_depth,
            normals: &comp_normals,
            albedo: &harmonized.albedo,
            light: light.coeffs,
        },
    )?;

    Ok(PipelineOutput {
        background: bg,
        bg_depth,
        bg_decomposition,
        bg_normals,
        fg_crop,
        fg_decomposition,
        placement,
        full_mask,
        full_depth,
        composite,
        comp_depth,
        comp_inv_shading,
        comp_normals,
        harmonized,
        light,
        result,
    })
}

impl PipelineOutput {
    /// Write every output, named after the background (`bg`) and
    /// foreground (`fg`) stems
    pub fn save(&self, writer: &mut JobWriter, bg: &str, fg: &str) -> Result<()> {
        let pair = format!("{bg}_{fg}");

        writer.save(bg, &self.background)?;
        writer.save(&format!("{bg}_depth"), &self.bg_depth)?;
        writer.save(&format!("{bg}_inv_shading"), &self.bg_decomposition.inv_shading)?;
        writer.save(&format!("{bg}_albedo"), &self.bg_decomposition.albedo)?;
        writer.save(&format!("{bg}_normals"), &self.bg_normals)?;
        writer.save(&format!("{bg}_light_vis"), &self.light.visualization)?;

        writer.save(&format!("{fg}_full_mask"), &self.full_mask)?;
        writer.save(&format!("{fg}_full_depth"), &self.full_depth)?;
        writer.save(&format!("{fg}_albedo"), &self.fg_decomposition.albedo)?;

        writer.save(&pair, &self.composite)?;
        writer.save(&format!("{pair}_depth"), &self.comp_depth)?;
        writer.save(&format!("{pair}_normals"), &self.comp_normals)?;
        writer.save(&format!("{pair}_harmonized"), &self.harmonized.composite)?;
        writer.save(&format!("{pair}_albedo_harmonized"), &self.harmonized.albedo)?;
        writer.save(&format!("{pair}_original_albedo"), &self.harmonized.original_albedo)?;
        writer.save(&format!("{pair}_main_result"), &self.result.composite)?;
        if let Some(reshading) = &self.result.reshading {
            writer.save(&format!("{pair}_reshading"), reshading)?;
        }
        Ok(())
    }
}

/// Load a job's images, run the pipeline and write its outputs.
/// Returns the output directory.
pub fn run_job<M: IntrinsicModels + ?Sized>(models: &mut M, job: &JobConfig) -> Result<PathBuf> {
    job.validate()?;
    info!(job = %job.name, background = %job.background.display(), foreground = %job.foreground.display(), "starting job");

    let background = ImageBuffer::open_rgb(&job.background)?;
    let (fg_image, fg_mask) = ImageBuffer::open_rgba(&job.foreground)?;
    let output = run(models, &job.pipeline, &background, &fg_image, &fg_mask)?;

    let mut writer = JobWriter::create(&job.output_dir())?;
    output.save(&mut writer, &stem(&job.background), &stem(&job.foreground))?;
    info!(dir = %writer.dir().display(), images = writer.written().len(), "job finished");
    Ok(writer.dir().to_path_buf())
}
