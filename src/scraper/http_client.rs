use crate::config::ClientConfig;
use crate::error::CollectError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::PageTransport;

/// reqwest-backed transport. Sends the caller's cookie string verbatim and
/// never retries: a failed round-trip surfaces as [`CollectError::Transport`].
pub struct HttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    /// `extra_headers` are sent on every request and override the defaults.
    pub fn new(config: &ClientConfig, extra_headers: &[(String, String)]) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        for (name, value) in extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name {:?}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            headers.insert(name, value);
        }

        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Multipart POST with optional file parts (`field`, path on disk).
    pub async fn post_multipart(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        files: &[(String, PathBuf)],
        cookie: Option<&str>,
    ) -> Result<String, CollectError> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.to_string(), value.to_string());
        }
        for (field, path) in files {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| CollectError::transport(url, e))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(&guess_mime(path))
                .map_err(|e| CollectError::transport(url, e))?;
            form = form.part(field.clone(), part);
        }

        self.polite_delay().await;
        debug!("POST {} ({} fields, {} files)", url, fields.len(), files.len());

        let request = self
            .inner
            .post(url)
            .multipart(form)
            .timeout(Duration::from_secs(self.config.post_timeout_secs));
        self.send(url, with_cookie(request, cookie)).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<String, CollectError> {
        let resp = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollectError::transport(url, e))?;

        resp.text()
            .await
            .map_err(|e| CollectError::transport(url, e))
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.config.jitter_ms);
        let total = self.config.request_delay_ms + jitter;
        if total > 0 {
            sleep(Duration::from_millis(total)).await;
        }
    }
}

/// Content type for a file part, from its extension.
fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

fn with_cookie(request: RequestBuilder, cookie: Option<&str>) -> RequestBuilder {
    match cookie {
        Some(cookie) if !cookie.is_empty() => request.header(COOKIE, cookie),
        _ => request,
    }
}

#[async_trait]
impl PageTransport for HttpClient {
    async fn fetch_page(&self, url: &str, cookie: Option<&str>) -> Result<String, CollectError> {
        debug!("GET {}", url);
        let request = self
            .inner
            .get(url)
            .timeout(Duration::from_secs(self.config.get_timeout_secs));
        self.send(url, with_cookie(request, cookie)).await
    }

    async fn submit_page(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Result<String, CollectError> {
        self.post_multipart(url, fields, &[], cookie).await
    }
}
