use crate::error::{PipelineError, Result};
use crate::process_request::ProcessRequest;
use crate::session::Session;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tracing::{error, info};
use url::Url;

pub const DEFAULT_PROCESS_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/process";

/// Anything that can turn a processing request into raw image bytes.
pub trait ProcessApi {
    async fn process(&self, request: &ProcessRequest, url: &Url) -> Result<Bytes>;
}

impl ProcessApi for Session {
    async fn process(&self, request: &ProcessRequest, url: &Url) -> Result<Bytes> {
        submit(self, request, url).await
    }
}

pub async fn submit(session: &Session, request: &ProcessRequest, url: &Url) -> Result<Bytes> {
    info!("Submitting processing request to {}", url);
    let response = session
        .post(url)
        .header(ACCEPT, request.output_format().as_str())
        .json(request)
        .send()
        .await?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        error!("Request failed with status code {}: {}", status, body);
        return Err(PipelineError::Request { status, body });
    }

    let content = response.bytes().await?;
    info!("Received {} bytes", content.len());
    Ok(content)
}
