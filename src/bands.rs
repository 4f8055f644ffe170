//! Per-band extraction and `-separate` composite merge.
use crate::asset::{MediaType, RasterAsset};
use crate::error::{PipelineError, Result};
use crate::raster;
use crate::tool::{ExternalTool, Tools};
use crate::workspace::Workspace;
use gdal::raster::{GdalDataType, GdalType};
use gdal::{Dataset, DriverManager};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct BandSplit {
    pub bands: Vec<RasterAsset>,
    pub composite: RasterAsset,
}

pub fn split_and_merge(src: &Path, workspace: &Workspace, tools: &Tools) -> Result<BandSplit> {
    let bands = split_bands(src, workspace, tools)?;
    let paths = bands.iter().map(|b| b.path.clone()).collect::<Vec<_>>();
    let composite = merge_separate(&paths, &workspace.true_color_path(), tools)?;
    Ok(BandSplit { bands, composite })
}

/// Writes every band of `src` to its own single-band GeoTIFF, in band order.
pub fn split_bands(
    src: &Path,
    workspace: &Workspace,
    tools: &Tools,
) -> Result<Vec<RasterAsset>> {
    let dataset = raster::open(src).inspect_err(|e| {
        error!("Failed to open the multi-band dataset: {}", e);
    })?;

    let band_count = dataset.raster_count();
    info!("Splitting {} bands from {}", band_count, src.display());

    let mut assets = Vec::with_capacity(band_count);
    for index in 1..=band_count {
        let output = workspace.band_path(index);
        write_band(&dataset, src, index, &output, tools)?;
        assets.push(RasterAsset::new(
            format!("band_{index}"),
            output,
            MediaType::Tiff,
        ));
    }
    Ok(assets)
}

fn write_band(
    dataset: &Dataset,
    src: &Path,
    index: usize,
    output: &Path,
    tools: &Tools,
) -> Result<()> {
    let data_type = dataset
        .rasterband(index)
        .map_err(|e| PipelineError::raster(output, e))?
        .band_type();

    let written = match data_type {
        GdalDataType::UInt8 => copy_band::<u8>(dataset, index, output),
        GdalDataType::UInt16 => copy_band::<u16>(dataset, index, output),
        GdalDataType::Int16 => copy_band::<i16>(dataset, index, output),
        GdalDataType::UInt32 => copy_band::<u32>(dataset, index, output),
        GdalDataType::Int32 => copy_band::<i32>(dataset, index, output),
        GdalDataType::Float32 => copy_band::<f32>(dataset, index, output),
        GdalDataType::Float64 => copy_band::<f64>(dataset, index, output),
        GdalDataType::Unknown => {
            return Err(PipelineError::UnsupportedDataType {
                band: index,
                data_type: data_type.name(),
            })
        }
        // Int8, Int64 and UInt64 only exist on newer GDAL builds.
        #[allow(unreachable_patterns)]
        _ => return extract_band(src, index, output, tools),
    };
    written.map_err(|e| PipelineError::raster(output, e))
}

/// Band extraction through `gdal_translate`, which keeps any sample type GDAL
/// supports along with georeferencing and no-data.
fn extract_band(src: &Path, index: usize, output: &Path, tools: &Tools) -> Result<()> {
    ExternalTool::new(&tools.translate)
        .args(["-of", "GTiff", "-b"])
        .arg(index.to_string())
        .arg(src)
        .arg(output)
        .run()?;
    Ok(())
}

/// Copies one band verbatim, keeping its sample type, georeferencing and
/// no-data value.
fn copy_band<T: GdalType + Copy>(
    dataset: &Dataset,
    index: usize,
    output: &Path,
) -> gdal::errors::Result<()> {
    let band = dataset.rasterband(index)?;
    let (cols, rows) = band.size();
    let mut buffer = band.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut out_ds = driver.create_with_band_type::<T, _>(output, cols, rows, 1)?;
    if let Ok(gt) = dataset.geo_transform() {
        out_ds.set_geo_transform(&gt)?;
    }
    if let Ok(srs) = dataset.spatial_ref() {
        out_ds.set_spatial_ref(&srs)?;
    }

    let mut out_band = out_ds.rasterband(1)?;
    if let Some(nodata) = band.no_data_value() {
        out_band.set_no_data_value(Some(nodata))?;
    }
    out_band.write((0, 0), (cols, rows), &mut buffer)?;
    Ok(())
}

/// Stacks single-band rasters into one multi-band raster, one band per input
/// in the given order.
pub fn merge_separate(inputs: &[PathBuf], output: &Path, tools: &Tools) -> Result<RasterAsset> {
    ExternalTool::new(&tools.merge)
        .arg("-o")
        .arg(output)
        .arg("-separate")
        .args(inputs)
        .run()?;
    info!("Saved {}-band composite {}", inputs.len(), output.display());
    Ok(RasterAsset::new("true_color", output, MediaType::Tiff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::tests::{gdal_tools_available, read_band, write_test_raster};

    #[test]
    fn test_split_bands_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tif");
        write_test_raster(&src, 3, 20, 10);
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let bands = split_bands(&src, &workspace, &Tools::default()).unwrap();

        assert_eq!(bands.len(), 3);
        for (i, band) in bands.iter().enumerate() {
            let index = i + 1;
            assert_eq!(band.name, format!("band_{index}"));
            assert_eq!(band.path, workspace.band_path(index));

            let dataset = Dataset::open(&band.path).unwrap();
            assert_eq!(dataset.raster_count(), 1);
            assert_eq!(dataset.raster_size(), (20, 10));
            assert_eq!(
                dataset.rasterband(1).unwrap().band_type(),
                GdalDataType::UInt8
            );
            assert_eq!(read_band(&band.path, 1), read_band(&src, index));
        }
    }

    #[test]
    fn test_split_keeps_float_samples() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("float.tif");
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        {
            let dataset = driver
                .create_with_band_type::<f32, _>(&src, 4, 2, 1)
                .unwrap();
            let data = vec![-12.5f32, 0.0, 3.25, 7.0, 1.0, 2.0, 3.0, 4.0];
            let mut buffer = gdal::raster::Buffer::new((4, 2), data);
            let mut band = dataset.rasterband(1).unwrap();
            band.write((0, 0), (4, 2), &mut buffer).unwrap();
        }
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let bands = split_bands(&src, &workspace, &Tools::default()).unwrap();

        let dataset = Dataset::open(&bands[0].path).unwrap();
        let band = dataset.rasterband(1).unwrap();
        assert_eq!(band.band_type(), GdalDataType::Float32);
        let values = band.read_as::<f32>((0, 0), (4, 2), (4, 2), None).unwrap();
        assert_eq!(values.data()[0], -12.5);
        assert_eq!(values.data()[2], 3.25);
    }

    #[test]
    fn test_split_carries_band_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tif");
        let transparent = dir.path().join("transparent.tif");
        write_test_raster(&src, 2, 8, 8);
        raster::mark_transparent(&src, &transparent, 0.0).unwrap();
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let bands = split_bands(&transparent, &workspace, &Tools::default()).unwrap();

        let first = Dataset::open(&bands[0].path).unwrap();
        assert_eq!(first.rasterband(1).unwrap().no_data_value(), Some(0.0));
    }

    #[test]
    fn test_unreadable_source_is_raster_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(dir.path().join("run")).unwrap();
        let err = split_bands(
            &dir.path().join("missing.tif"),
            &workspace,
            &Tools::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::RasterOpen { .. }));
    }

    #[test]
    fn test_split_keeps_64_bit_samples() {
        if !gdal_tools_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let narrow = dir.path().join("narrow.tif");
        let wide = dir.path().join("wide.tif");
        write_test_raster(&narrow, 2, 6, 5);
        let converted = ExternalTool::new(Tools::default().translate)
            .args(["-ot", "Int64"])
            .arg(&narrow)
            .arg(&wide)
            .run();
        if converted.is_err() {
            eprintln!("GDAL build has no Int64 support, skipping");
            return;
        }
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let bands = split_bands(&wide, &workspace, &Tools::default()).unwrap();

        assert_eq!(bands.len(), 2);
        for (i, band) in bands.iter().enumerate() {
            let dataset = Dataset::open(&band.path).unwrap();
            assert_eq!(dataset.raster_count(), 1);
            assert_eq!(dataset.raster_size(), (6, 5));
            assert_eq!(dataset.rasterband(1).unwrap().band_type().name(), "Int64");
            assert_eq!(read_band(&band.path, 1), read_band(&narrow, i + 1));
        }
    }

    #[test]
    fn test_split_and_merge_round_trip() {
        if !gdal_tools_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tif");
        write_test_raster(&src, 2, 24, 16);
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let split = split_and_merge(&src, &workspace, &Tools::default()).unwrap();

        assert_eq!(split.bands.len(), 2);
        assert_eq!(split.composite.path, workspace.true_color_path());
        let composite = Dataset::open(&split.composite.path).unwrap();
        assert_eq!(composite.raster_count(), 2);
        assert_eq!(composite.raster_size(), (24, 16));
        for index in 1..=2 {
            assert_eq!(
                read_band(&split.composite.path, index),
                read_band(&src, index)
            );
        }
    }
}
