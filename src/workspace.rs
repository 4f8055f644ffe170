//! Run-scoped output layout. Every path a stage writes to lives under one
//! run directory so repeated runs never overwrite each other.
use crate::asset::MediaType;
use anyhow::Result;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const COG_DIR: &str = "cog";
const BANDS_DIR: &str = "bands";
const TRUE_COLOR_DIR: &str = "true_color";
const OVERVIEW_DIR: &str = "overview";
const THUMBNAIL_DIR: &str = "thumbnail";

#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a fresh run directory below `output_dir`.
    pub fn for_run<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let run_id = format!(
            "run-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            std::process::id()
        );
        Self::create(output_dir.as_ref().join(run_id))
    }

    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [COG_DIR, BANDS_DIR, TRUE_COLOR_DIR, OVERVIEW_DIR, THUMBNAIL_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        info!("Workspace ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_path(&self, format: MediaType) -> PathBuf {
        self.root.join(format!("raw.{}", format.extension()))
    }

    pub fn write_raw(&self, format: MediaType, content: &[u8]) -> Result<PathBuf> {
        let path = self.raw_path(format);
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn cog_path(&self) -> PathBuf {
        self.root.join(COG_DIR).join("data_cog.tif")
    }

    pub fn transparent_path(&self) -> PathBuf {
        self.root.join(COG_DIR).join("data_cog_transparent.tif")
    }

    /// `index` is 1-based, matching GDAL band numbering.
    pub fn band_path(&self, index: usize) -> PathBuf {
        self.root.join(BANDS_DIR).join(format!("band_{index}.tif"))
    }

    pub fn true_color_path(&self) -> PathBuf {
        self.root.join(TRUE_COLOR_DIR).join("true_color.tif")
    }

    pub fn overview_path(&self) -> PathBuf {
        self.root.join(OVERVIEW_DIR).join("overview.webp")
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.root.join(THUMBNAIL_DIR).join("thumbnail.webp")
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join("item.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_makes_stage_directories() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        assert!(workspace.cog_path().parent().unwrap().is_dir());
        assert!(workspace.band_path(1).parent().unwrap().is_dir());
        assert!(workspace.true_color_path().parent().unwrap().is_dir());
        assert!(workspace.overview_path().parent().unwrap().is_dir());
        assert!(workspace.thumbnail_path().parent().unwrap().is_dir());
    }

    #[test]
    fn test_runs_do_not_share_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let first = Workspace::for_run(dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = Workspace::for_run(dir.path()).unwrap();
        assert_ne!(first.root(), second.root());
    }

    #[test]
    fn test_raw_path_follows_format() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(dir.path()).unwrap();
        let path = workspace.write_raw(MediaType::Png, b"png").unwrap();

        assert_eq!(path.file_name().unwrap(), "raw.png");
        assert_eq!(fs::read(path).unwrap(), b"png");
        assert_eq!(
            workspace.band_path(2).file_name().unwrap(),
            "band_2.tif"
        );
    }
}
