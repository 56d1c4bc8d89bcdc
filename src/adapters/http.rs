use crate::domain::model::Document;
use crate::domain::ports::{DocumentFetcher, Resolver};
use crate::utils::error::{MeasureError, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;

/// Well-known sub-path of every hosting location.
pub const DOCUMENT_PATH: &str = "index.json";

const MAX_REDIRECTS: usize = 10;

/// URL of the DT doc served at a hosting location.
pub fn document_url(hosting_location: &str) -> String {
    format!("{}/{}", hosting_location.trim_end_matches('/'), DOCUMENT_PATH)
}

/// Twin web client over HTTP: resolution follows redirects from the DTID,
/// documents are read from `<hosting location>/index.json`.
#[derive(Debug, Clone)]
pub struct HttpTwinClient {
    client: Client,
}

impl HttpTwinClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Resolver for HttpTwinClient {
    async fn resolve(&self, identifier: &str, timeout: Duration) -> Result<String> {
        tracing::debug!("Resolving DTID: {}", identifier);
        let response = self
            .client
            .get(identifier)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MeasureError::ResolveTimeout {
                        dtid: identifier.to_string(),
                        timeout,
                    }
                } else {
                    MeasureError::ResolveError {
                        dtid: identifier.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        // 只需要重新導向後的最終位址，不讀取內容
        let hosting_location = response.url().to_string();
        tracing::debug!("DTID {} resolved to {}", identifier, hosting_location);
        Ok(hosting_location)
    }
}

#[async_trait]
impl DocumentFetcher for HttpTwinClient {
    async fn fetch_document(&self, hosting_location: &str, timeout: Duration) -> Result<Document> {
        let url = document_url(hosting_location);
        tracing::debug!("Fetching DT doc: {}", url);

        let fetch_error = |e: reqwest::Error| {
            if e.is_timeout() {
                MeasureError::FetchTimeout {
                    url: url.clone(),
                    timeout,
                }
            } else {
                MeasureError::FetchError {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?;

        let body = response.bytes().await.map_err(fetch_error)?;

        serde_json::from_slice::<Document>(&body).map_err(|e| MeasureError::ParseError {
            url: url.clone(),
            message: e.to_string(),
        })
    }
}
