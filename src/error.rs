use gdal::errors::GdalError;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Token endpoint {url} rejected the client credentials ({status}): {body}")]
    Auth {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Processing request failed with status code {status}: {body}")]
    Request { status: StatusCode, body: String },

    #[error("Unable to open raster {}", path.display())]
    RasterOpen {
        path: PathBuf,
        #[source]
        source: GdalError,
    },

    #[error("Raster operation on {} failed", path.display())]
    Raster {
        path: PathBuf,
        #[source]
        source: GdalError,
    },

    #[error("Band {band} has unsupported data type {data_type}")]
    UnsupportedDataType { band: usize, data_type: String },

    #[error("Unable to launch `{program}`")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {code}: {stderr}")]
    Tool {
        program: String,
        code: String,
        stderr: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn raster_open(path: impl Into<PathBuf>, source: GdalError) -> Self {
        Self::RasterOpen {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn raster(path: impl Into<PathBuf>, source: GdalError) -> Self {
        Self::Raster {
            path: path.into(),
            source,
        }
    }
}
