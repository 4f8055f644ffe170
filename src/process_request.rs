//! Wire model of a Sentinel Hub Process API request.
use crate::asset::MediaType;
use anyhow::{anyhow, ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel-1 GRD VV/VH composite in decibels, clamped to -20..0 dB.
pub const SENTINEL1_DB_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: ["VV", "VH"],
    output: { id: "default", bands: 3 },
  }
}

function evaluatePixel(samples) {
  var vvdB = toDb(samples.VV)
  var vhdB = toDb(samples.VH)
  return [vvdB, vhdB, vvdB / vhdB / 10]
}

function toDb(linear) {
  return Math.max(0, Math.log(linear) * 0.21714724095 + 1)
}
"#;

const DEFAULT_RESPONSE_ID: &str = "default";

/// Only built through [`ProcessRequest::new`], which validates the parameters
/// and always describes exactly one data source and one response.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProcessRequest {
    input: Input,
    output: Output,
    evalscript: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
struct Input {
    bounds: Bounds,
    data: [DataSource; 1],
}

#[derive(Serialize, Clone, Debug, PartialEq)]
struct Bounds {
    bbox: [f64; 4],
    properties: BoundsProperties,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
struct BoundsProperties {
    crs: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct DataSource {
    #[serde(rename = "type")]
    kind: String,
    data_filter: DataFilter,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    processing: BTreeMap<String, String>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct DataFilter {
    time_range: TimeRange,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
struct Output {
    width: u32,
    height: u32,
    responses: [ResponseEntry; 1],
}

#[derive(Serialize, Clone, Debug, PartialEq)]
struct ResponseEntry {
    identifier: String,
    format: Format,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
struct Format {
    #[serde(rename = "type")]
    media_type: MediaType,
}

/// Parameters a [`ProcessRequest`] is built from.
#[derive(Clone, Debug)]
pub struct RequestParams {
    pub bbox: [f64; 4],
    pub crs: String,
    pub data_type: String,
    pub time_range: TimeRange,
    pub processing: BTreeMap<String, String>,
    pub width: u32,
    pub height: u32,
    pub format: MediaType,
    pub evalscript: String,
}

impl ProcessRequest {
    pub fn new(params: RequestParams) -> Result<Self> {
        let TimeRange { from, to } = params.time_range;
        ensure!(
            from <= to,
            "Time range starts after it ends: {} > {}",
            from,
            to
        );
        ensure!(
            params.width > 0 && params.height > 0,
            "Output size must be non-zero, got {}x{}",
            params.width,
            params.height
        );
        if params.evalscript.trim().is_empty() {
            return Err(anyhow!("Evalscript is empty"));
        }

        Ok(Self {
            input: Input {
                bounds: Bounds {
                    bbox: params.bbox,
                    properties: BoundsProperties { crs: params.crs },
                },
                data: [DataSource {
                    kind: params.data_type,
                    data_filter: DataFilter {
                        time_range: params.time_range,
                    },
                    processing: params.processing,
                }],
            },
            output: Output {
                width: params.width,
                height: params.height,
                responses: [ResponseEntry {
                    identifier: DEFAULT_RESPONSE_ID.to_string(),
                    format: Format {
                        media_type: params.format,
                    },
                }],
            },
            evalscript: params.evalscript,
        })
    }

    pub fn bbox(&self) -> [f64; 4] {
        self.input.bounds.bbox
    }

    pub fn crs(&self) -> &str {
        &self.input.bounds.properties.crs
    }

    pub fn time_range(&self) -> TimeRange {
        self.input.data[0].data_filter.time_range
    }

    pub fn evalscript(&self) -> &str {
        &self.evalscript
    }

    pub fn output_format(&self) -> MediaType {
        self.output.responses[0].format.media_type
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.output.width, self.output.height)
    }

    pub fn data_type(&self) -> &str {
        &self.input.data[0].kind
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
