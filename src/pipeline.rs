//! Request → COG → transparent copy → previews and bands → metadata record.
//!
//! Every stage returns a `Result`; the first failure ends the run and no
//! later stage is attempted.
use crate::asset::ProductAssets;
use crate::bands;
use crate::preview;
use crate::raster;
use crate::requester::ProcessApi;
use crate::run_config::RunConfig;
use crate::session::{Credentials, Session};
use crate::stac_record::MetadataRecord;
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct RunSummary {
    pub record: MetadataRecord,
    pub record_path: PathBuf,
    pub assets: ProductAssets,
}

/// Authenticates first, then runs in a fresh `run-*` directory under
/// `output_dir`. Nothing is written when the credentials are rejected.
pub async fn authenticate_and_run(
    credentials: &Credentials,
    config: &RunConfig,
    output_dir: &Path,
) -> Result<RunSummary> {
    let session = Session::authenticate(credentials, &config.endpoints.token_url)
        .await
        .context("Authentication failed")?;

    let outcome = match Workspace::for_run(output_dir) {
        Ok(workspace) => run(&session, config, &workspace).await,
        Err(e) => Err(e.context("Unable to create run directory")),
    };
    session.close();
    outcome
}

pub async fn run(
    api: &impl ProcessApi,
    config: &RunConfig,
    workspace: &Workspace,
) -> Result<RunSummary> {
    let request = config
        .process_request()
        .context("Invalid processing request")?;
    let url = &config.endpoints.process_url;
    let tools = &config.tools;
    let preview_options = config.output.preview_options();

    let content = api
        .process(&request, url)
        .await
        .context("Processing request failed")?;
    let raw = workspace.write_raw(request.output_format(), &content)?;

    let cog = raster::to_cog(&raw, &workspace.cog_path(), tools)
        .context("COG conversion failed")?;
    let transparent = raster::mark_transparent(
        cog.path(),
        &workspace.transparent_path(),
        config.output.nodata,
    )
    .context("No-data marking failed")?;

    let thumbnail = preview::thumbnail(
        transparent.path(),
        &workspace.thumbnail_path(),
        tools,
        &preview_options,
    )
    .context("Thumbnail generation failed")?;
    let overview = preview::overview(
        transparent.path(),
        &workspace.overview_path(),
        tools,
        &preview_options,
    )
    .context("Overview generation failed")?;

    let split = bands::split_and_merge(transparent.path(), workspace, tools)
        .context("Band extraction failed")?;

    let assets = ProductAssets {
        cog,
        transparent,
        bands: split.bands,
        true_color: split.composite,
        overview,
        thumbnail,
    };
    let record = MetadataRecord::build(&config.item_id(), &request, url, &assets)
        .context("Building metadata record failed")?;
    let record_path = workspace.record_path();
    record
        .write(&record_path)
        .context("Writing metadata record failed")?;
    info!("Saved metadata record {}", record_path.display());

    Ok(RunSummary {
        record,
        record_path,
        assets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{self, PipelineError};
    use crate::process_request::ProcessRequest;
    use crate::raster::tests::{gdal_tools_available, write_test_raster};
    use crate::run_config::sentinel1_grd_template;
    use bytes::Bytes;
    use httpmock::prelude::*;
    use httpmock::MockServer;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::fs;
    use url::Url;

    struct CannedApi(Bytes);

    impl ProcessApi for CannedApi {
        async fn process(&self, _request: &ProcessRequest, _url: &Url) -> error::Result<Bytes> {
            Ok(self.0.clone())
        }
    }

    fn tiff_config() -> RunConfig {
        let mut config = RunConfig::from_template(&sentinel1_grd_template()).unwrap();
        config.request.format = "image/tiff".to_string();
        config
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut files = vec![];
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(files_under(&path));
            } else {
                files.push(path);
            }
        }
        files
    }

    #[tokio::test]
    async fn test_unauthorized_request_stops_the_run() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"access_token": "expired", "token_type": "Bearer"}));
        });
        let process_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/process");
            then.status(401).body("{\"error\":{\"status\":401,\"reason\":\"Unauthorized\"}}");
        });

        let mut config = RunConfig::from_template(&sentinel1_grd_template()).unwrap();
        config.endpoints.token_url = Url::parse(&server.url("/token")).unwrap();
        config.endpoints.process_url = Url::parse(&server.url("/api/v1/process")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let session = Session::authenticate(
            &Credentials::new("id", "secret"),
            &config.endpoints.token_url,
        )
        .await
        .unwrap();
        let err = run(&session, &config, &workspace).await.unwrap_err();
        session.close();

        process_mock.assert();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Request { status, body }) => {
                assert_eq!(*status, StatusCode::UNAUTHORIZED);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(files_under(workspace.root()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_credentials_leave_no_run_directory() {
        let server = MockServer::start_async().await;
        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(401).body("{\"error\":\"invalid_client\"}");
        });

        let mut config = RunConfig::from_template(&sentinel1_grd_template()).unwrap();
        config.endpoints.token_url = Url::parse(&server.url("/token")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("outputs");

        let err = authenticate_and_run(&Credentials::new("id", "wrong"), &config, &output_dir)
            .await
            .unwrap_err();

        token_mock.assert();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Auth { .. })
        ));
        assert!(!output_dir.exists());
    }

    #[tokio::test]
    async fn test_unreadable_response_stops_before_derivatives() {
        if !gdal_tools_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(dir.path().join("run")).unwrap();
        let api = CannedApi(Bytes::from_static(b"<html>maintenance</html>"));

        let err = run(&api, &tiff_config(), &workspace).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Tool { .. })
        ));
        assert!(!workspace.transparent_path().exists());
        assert!(!workspace.band_path(1).exists());
        assert!(!workspace.record_path().exists());
    }

    #[tokio::test]
    async fn test_two_band_product_end_to_end() {
        if !gdal_tools_available() || gdal::DriverManager::get_driver_by_name("WEBP").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("vv_vh.tif");
        write_test_raster(&raw, 2, 512, 512);
        let api = CannedApi(Bytes::from(fs::read(&raw).unwrap()));
        let workspace = Workspace::create(dir.path().join("run")).unwrap();

        let summary = run(&api, &tiff_config(), &workspace).await.unwrap();

        let assets = &summary.assets;
        assert!(assets.cog.path.exists());
        assert!(assets.transparent.path.exists());
        assert_eq!(assets.bands.len(), 2);
        assert!(assets.bands.iter().all(|b| b.path.exists()));
        assert!(assets.true_color.path.exists());
        assert!(assets.overview.path.exists());
        assert!(fs::metadata(&assets.overview.path).unwrap().len() <= 500 * 1024);

        let (cols, rows) = gdal::Dataset::open(&assets.thumbnail.path)
            .unwrap()
            .raster_size();
        assert!(cols <= 500 && rows <= 500);

        let record = MetadataRecord::read(&summary.record_path).unwrap();
        let mut keys = record.assets.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        let mut expected = [
            "request",
            "COG",
            "true_color",
            "overview",
            "thumbnail",
            "band_1",
            "band_2",
        ];
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(record.id, "sentinel-1-grd-rome-2019q1");
    }
}
