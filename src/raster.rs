//! Raster conversion: raw response to COG, and no-data marking.
use crate::asset::{MediaType, RasterAsset};
use crate::error::{PipelineError, Result};
use crate::tool::{ExternalTool, Tools};
use gdal::raster::RasterCreationOptions;
use gdal::{Dataset, DriverManager};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_NODATA: f64 = 0.0;

/// Opens a raster read-only, mapping failures to [`PipelineError::RasterOpen`].
pub fn open(path: &Path) -> Result<Dataset> {
    Dataset::open(path).map_err(|e| PipelineError::raster_open(path, e))
}

/// Rewrites any raster GDAL can read as a Cloud-Optimized GeoTIFF.
pub fn to_cog(raw: &Path, cog: &Path, tools: &Tools) -> Result<RasterAsset> {
    ExternalTool::new(&tools.translate)
        .arg(raw)
        .arg(cog)
        .args(["-of", "COG"])
        .run()?;
    info!("Saved {} as COG {}", raw.display(), cog.display());
    Ok(RasterAsset::new("COG", cog, MediaType::Tiff))
}

/// Writes a GTiff copy of `src` to `dst` and declares `nodata` as band 1's
/// no-data value so those pixels render transparent. Pixel data is not
/// modified. GeoTIFF keeps one no-data tag per file, so readers will report it
/// for every band. When `dst` names the same file as `src` the copy is staged
/// next to it and renamed over the source once complete.
pub fn mark_transparent(src: &Path, dst: &Path, nodata: f64) -> Result<RasterAsset> {
    let source = open(src)?;
    let (cols, rows) = source.raster_size();
    debug!(
        "Marking no-data {} on band 1 of {} ({}x{}, {} bands)",
        nodata,
        src.display(),
        cols,
        rows,
        source.raster_count()
    );

    let in_place = same_file(src, dst)?;
    let target = if in_place {
        dst.with_extension("partial.tif")
    } else {
        dst.to_path_buf()
    };

    if let Err(e) = write_transparent_copy(&source, &target, nodata) {
        if target.exists() {
            if let Err(cleanup) = fs::remove_file(&target) {
                warn!("Unable to remove partial copy {}: {}", target.display(), cleanup);
            }
        }
        return Err(e);
    }
    drop(source);

    if in_place {
        fs::rename(&target, dst)?;
    }
    info!("Saved transparent copy {}", dst.display());
    Ok(RasterAsset::new("transparent", dst, MediaType::Tiff))
}

fn write_transparent_copy(source: &Dataset, target: &Path, nodata: f64) -> Result<()> {
    let driver =
        DriverManager::get_driver_by_name("GTiff").map_err(|e| PipelineError::raster(target, e))?;
    let copy = source
        .create_copy(&driver, target, &RasterCreationOptions::new())
        .map_err(|e| PipelineError::raster(target, e))?;

    let mut band = copy
        .rasterband(1)
        .map_err(|e| PipelineError::raster(target, e))?;
    band.set_no_data_value(Some(nodata))
        .map_err(|e| PipelineError::raster(target, e))?;

    // The copy is only flushed to disk once its handle is closed.
    drop(band);
    drop(copy);
    Ok(())
}

/// Compares resolved paths, so `./a.tif` and `a.tif` are the same file.
fn same_file(src: &Path, dst: &Path) -> Result<bool> {
    if !dst.exists() {
        return Ok(false);
    }
    Ok(fs::canonicalize(src)? == fs::canonicalize(dst)?)
}
