//! STAC-like item describing one run's request and products.
use crate::asset::{ProductAssets, RasterAsset};
use crate::process_request::ProcessRequest;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stac::{Asset, Link};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use url::Url;

pub const STAC_VERSION: &str = "1.0.0";
const FEATURE: &str = "Feature";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MetadataRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub stac_version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    pub assets: BTreeMap<String, Asset>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Properties {
    pub evalscript: String,
    pub bounding_box: [f64; 4],
    pub time_range: TimeWindow,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct TimeWindow {
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
}

impl MetadataRecord {
    /// Pure assembly; paths are recorded as given and not checked on disk.
    pub fn build(
        id: &str,
        request: &ProcessRequest,
        url: &Url,
        assets: &ProductAssets,
    ) -> Result<Self> {
        let time_range = request.time_range();
        let properties = Properties {
            evalscript: request.evalscript().to_string(),
            bounding_box: request.bbox(),
            time_range: TimeWindow {
                start_datetime: time_range.from,
                end_datetime: time_range.to,
            },
        };

        let mut record_assets = BTreeMap::new();
        record_assets.insert("request".to_string(), request_asset(request, url)?);
        record_assets.insert("COG".to_string(), file_asset(&assets.cog));
        record_assets.insert("true_color".to_string(), file_asset(&assets.true_color));
        record_assets.insert("overview".to_string(), file_asset(&assets.overview));
        record_assets.insert("thumbnail".to_string(), file_asset(&assets.thumbnail));
        for (i, band) in assets.bands.iter().enumerate() {
            record_assets.insert(format!("band_{}", i + 1), file_asset(band));
        }

        Ok(Self {
            kind: FEATURE.to_string(),
            stac_version: STAC_VERSION.to_string(),
            id: id.to_string(),
            geometry: None,
            properties,
            links: None,
            assets: record_assets,
        })
    }

    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&content)?;
        Ok(record)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn file_asset(raster: &RasterAsset) -> Asset {
    let mut asset = Asset::new(raster.href());
    asset.r#type = Some(raster.media_type.as_str().to_string());
    asset
}

/// Describes how to replay the processing request.
fn request_asset(request: &ProcessRequest, url: &Url) -> Result<Asset> {
    let mut asset = Asset::new(url.as_str());
    let fields = &mut asset.additional_fields;
    fields.insert("method".to_string(), json!("POST"));
    fields.insert(
        "headers".to_string(),
        json!({ "Accept": request.output_format().as_str() }),
    );
    fields.insert("body".to_string(), request.to_json()?);
    Ok(asset)
}
