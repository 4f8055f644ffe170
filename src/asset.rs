use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    #[serde(rename = "image/tiff")]
    Tiff,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiff => "image/tiff",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tiff => "tif",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// Maps an output format as named in a processing request, e.g. `image/png`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/tiff" => Some(Self::Tiff),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file produced by one pipeline stage and consumed by the next.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterAsset {
    pub name: String,
    pub path: PathBuf,
    pub media_type: MediaType,
}

impl RasterAsset {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, media_type: MediaType) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            media_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn href(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Everything a successful run leaves on disk.
#[derive(Clone, Debug)]
pub struct ProductAssets {
    pub cog: RasterAsset,
    pub transparent: RasterAsset,
    pub bands: Vec<RasterAsset>,
    pub true_color: RasterAsset,
    pub overview: RasterAsset,
    pub thumbnail: RasterAsset,
}
