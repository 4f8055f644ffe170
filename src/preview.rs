//! WEBP overview and thumbnail renditions.
use crate::asset::{MediaType, RasterAsset};
use crate::error::{PipelineError, Result};
use crate::raster;
use crate::tool::{ExternalTool, Tools};
use gdal::raster::GdalDataType;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_THUMBNAIL_MAX_PX: usize = 500;
pub const DEFAULT_OVERVIEW_BUDGET_KB: u64 = 500;

#[derive(Clone, Debug)]
pub struct PreviewOptions {
    pub overview_budget_bytes: u64,
    /// WEBP qualities tried in order until the overview fits the budget.
    pub overview_quality: Vec<u8>,
    pub thumbnail_max_px: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            overview_budget_bytes: DEFAULT_OVERVIEW_BUDGET_KB * 1024,
            overview_quality: vec![90, 75, 60, 45, 30],
            thumbnail_max_px: DEFAULT_THUMBNAIL_MAX_PX,
        }
    }
}

/// Full-resolution WEBP rendition, re-encoded at falling quality until it
/// fits `overview_budget_bytes`. If even the last quality is too large the
/// result is kept and a warning logged.
pub fn overview(
    src: &Path,
    dst: &Path,
    tools: &Tools,
    options: &PreviewOptions,
) -> Result<RasterAsset> {
    let band_args = webp_band_args(src)?;
    let asset = RasterAsset::new("overview", dst, MediaType::Webp);

    let mut size = 0;
    for quality in &options.overview_quality {
        encode_webp(src, dst, tools, &band_args, *quality, None)?;
        size = fs::metadata(dst)?.len();
        if size <= options.overview_budget_bytes {
            info!(
                "Saved overview {} ({} bytes, quality {})",
                dst.display(),
                size,
                quality
            );
            return Ok(asset);
        }
        debug!("Overview is {} bytes at quality {}", size, quality);
    }

    if options.overview_quality.is_empty() {
        encode_webp(src, dst, tools, &band_args, 75, None)?;
        size = fs::metadata(dst)?.len();
    }
    if size > options.overview_budget_bytes {
        warn!(
            "Overview {} is {} bytes, above the {} byte budget",
            dst.display(),
            size,
            options.overview_budget_bytes
        );
    }
    Ok(asset)
}

/// WEBP thumbnail no larger than `thumbnail_max_px` on either axis.
pub fn thumbnail(
    src: &Path,
    dst: &Path,
    tools: &Tools,
    options: &PreviewOptions,
) -> Result<RasterAsset> {
    let (cols, rows) = raster::open(src)?.raster_size();
    let band_args = webp_band_args(src)?;
    let size = fit_within(cols, rows, options.thumbnail_max_px);

    encode_webp(src, dst, tools, &band_args, 75, Some(size))?;
    info!(
        "Saved thumbnail {} ({}x{})",
        dst.display(),
        size.0,
        size.1
    );
    Ok(RasterAsset::new("thumbnail", dst, MediaType::Webp))
}

/// Scales `(cols, rows)` down to fit a `max` x `max` box, keeping the aspect
/// ratio. Never upscales.
pub fn fit_within(cols: usize, rows: usize, max: usize) -> (usize, usize) {
    let max = max.max(1);
    if cols <= max && rows <= max {
        return (cols, rows);
    }
    let scale = max as f64 / cols.max(rows) as f64;
    let scaled = |n: usize| ((n as f64 * scale).round() as usize).clamp(1, max);
    (scaled(cols), scaled(rows))
}

/// Band numbers fed to the WEBP encoder, which needs exactly three. Missing
/// bands are filled with band 1.
pub fn preview_bands(band_count: usize) -> [usize; 3] {
    let mut bands = [1; 3];
    for (slot, band) in bands.iter_mut().zip(1..=band_count) {
        *slot = band;
    }
    bands
}

fn webp_band_args(src: &Path) -> Result<Vec<String>> {
    let dataset = raster::open(src)?;
    let mut args = vec![];
    for band in preview_bands(dataset.raster_count()) {
        args.push("-b".to_string());
        args.push(band.to_string());
    }

    let data_type = dataset
        .rasterband(1)
        .map_err(|e| PipelineError::raster(src, e))?
        .band_type();
    if data_type != GdalDataType::UInt8 {
        args.extend(["-ot", "Byte", "-scale"].map(String::from));
    }
    Ok(args)
}

fn encode_webp(
    src: &Path,
    dst: &Path,
    tools: &Tools,
    band_args: &[String],
    quality: u8,
    size: Option<(usize, usize)>,
) -> Result<()> {
    let mut tool = ExternalTool::new(&tools.translate)
        .args(["-of", "WEBP"])
        .args(band_args)
        .arg("-co")
        .arg(format!("QUALITY={quality}"));
    if let Some((cols, rows)) = size {
        tool = tool
            .arg("-outsize")
            .arg(cols.to_string())
            .arg(rows.to_string());
    }
    tool.arg(src).arg(dst).run()?;
    Ok(())
}
