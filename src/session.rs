//! OAuth2 client-credentials session for the processing API.
use crate::error::{PipelineError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Authenticated HTTP session. Every request built through it carries the
/// bearer token. The token is never refreshed.
pub struct Session {
    client: Client,
    access_token: String,
}

impl Session {
    pub async fn authenticate(credentials: &Credentials, token_url: &Url) -> Result<Self> {
        let client = Client::new();
        Self::authenticate_with(client, credentials, token_url).await
    }

    pub async fn authenticate_with(
        client: Client,
        credentials: &Credentials,
        token_url: &Url,
    ) -> Result<Self> {
        info!("Requesting access token for client {}", credentials.client_id);
        let response = client
            .post(token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = token_compliance_hook(token_url, response)
            .await?
            .json()
            .await?;

        debug!("Access token issued, expires in {:?}s", token.expires_in);
        Ok(Self {
            client,
            access_token: token.access_token,
        })
    }

    pub fn post(&self, url: &Url) -> RequestBuilder {
        self.client
            .post(url.clone())
            .bearer_auth(&self.access_token)
    }

    pub fn close(self) {
        debug!("Closing processing API session");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Runs on every token response; any non-2xx status fails authentication.
async fn token_compliance_hook(token_url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Auth {
        url: token_url.to_string(),
        status,
        body,
    })
}
