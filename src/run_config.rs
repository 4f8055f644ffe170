use crate::asset::MediaType;
use crate::preview::{PreviewOptions, DEFAULT_OVERVIEW_BUDGET_KB, DEFAULT_THUMBNAIL_MAX_PX};
use crate::process_request::{ProcessRequest, RequestParams, TimeRange, SENTINEL1_DB_EVALSCRIPT};
use crate::raster::DEFAULT_NODATA;
use crate::requester::DEFAULT_PROCESS_URL;
use crate::session::DEFAULT_TOKEN_URL;
use crate::tool::Tools;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use toml;
use url::Url;

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
    pub request: RequestConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tools: Tools,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Endpoints {
    pub token_url: Url,
    pub process_url: Url,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RequestConfig {
    pub bbox: [f64; 4],
    pub crs: String,
    pub data_type: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evalscript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evalscript_path: Option<PathBuf>,
    #[serde(default)]
    pub processing: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub nodata: f64,
    pub thumbnail_max_px: usize,
    pub overview_budget_kb: u64,
    pub overview_quality: Vec<u8>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("Default token URL should parse"),
            process_url: Url::parse(DEFAULT_PROCESS_URL)
                .expect("Default process URL should parse"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let preview = PreviewOptions::default();
        Self {
            dir: PathBuf::from("./outputs"),
            nodata: DEFAULT_NODATA,
            thumbnail_max_px: DEFAULT_THUMBNAIL_MAX_PX,
            overview_budget_kb: DEFAULT_OVERVIEW_BUDGET_KB,
            overview_quality: preview.overview_quality,
        }
    }
}

impl OutputConfig {
    pub fn preview_options(&self) -> PreviewOptions {
        PreviewOptions {
            overview_budget_bytes: self.overview_budget_kb * 1024,
            overview_quality: self.overview_quality.clone(),
            thumbnail_max_px: self.thumbnail_max_px,
        }
    }
}

/// The Sentinel-1 GRD VV/VH run over Rome the pipeline was first built for.
pub fn sentinel1_grd_template() -> toml::Table {
    toml::toml! {
        item_id = "sentinel-1-grd-rome-2019q1"

        [endpoints]
        token_url = "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token"
        process_url = "https://sh.dataspace.copernicus.eu/api/v1/process"

        [request]
        bbox = [1360000.0, 5121900.0, 1370000.0, 5131900.0]
        crs = "http://www.opengis.net/def/crs/EPSG/0/3857"
        data_type = "sentinel-1-grd"
        from = "2019-02-02T00:00:00Z"
        to = "2019-04-02T23:59:59Z"
        width = 512
        height = 512
        format = "image/png"
        processing = { orthorectify = "true" }

        [output]
        dir = "./outputs"
        nodata = 0.0
        thumbnail_max_px = 500
        overview_budget_kb = 500
        overview_quality = [90, 75, 60, 45, 30]

        [tools]
        translate = "gdal_translate"
        merge = "gdal_merge.py"
    }
}

impl RunConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        Ok(config)
    }

    pub fn evalscript(&self) -> Result<String> {
        match (&self.request.evalscript, &self.request.evalscript_path) {
            (Some(_), Some(_)) => Err(anyhow!(
                "Set either `evalscript` or `evalscript_path`, not both"
            )),
            (Some(script), None) => Ok(script.clone()),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("Unable to read evalscript {}", path.display())),
            (None, None) => Ok(SENTINEL1_DB_EVALSCRIPT.to_string()),
        }
    }

    pub fn process_request(&self) -> Result<ProcessRequest> {
        let request = &self.request;
        let format = MediaType::from_mime(&request.format)
            .ok_or_else(|| anyhow!("Unsupported output format: {}", request.format))?;

        ProcessRequest::new(RequestParams {
            bbox: request.bbox,
            crs: request.crs.clone(),
            data_type: request.data_type.clone(),
            time_range: TimeRange {
                from: request.from,
                to: request.to,
            },
            processing: request.processing.clone(),
            width: request.width,
            height: request.height,
            format,
            evalscript: self.evalscript()?,
        })
    }

    /// Configured item id, or one derived from the data type and start date.
    pub fn item_id(&self) -> String {
        self.item_id.clone().unwrap_or_else(|| {
            format!(
                "{}-{}",
                self.request.data_type,
                self.request.from.format("%Y%m%d")
            )
        })
    }
}
