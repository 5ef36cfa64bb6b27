//! Convertio API adapter.
//!
//! Implements the core `ConversionPort` over Convertio's three JSON endpoints:
//! submit (`POST /convert`), status (`GET /convert/{id}/status`) and result
//! download (`GET /convert/{id}/dl`, with a raw-URL fallback).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::{debug, warn};

use fcb_core::{
    domain::JobId,
    errors::Error,
    ports::{ConversionPort, PollOutcome},
    Result,
};

const BASE_URL: &str = "https://api.convertio.co";

#[derive(Clone, Debug)]
pub struct ConvertioClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl ConvertioClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        })
    }
}

/// The individual HTTP calls behind `fetch_result`, split out so the
/// two-path sequencing in `fetch_with` can be exercised without a server.
#[async_trait]
trait FetchSteps {
    /// Direct-content download. `Ok(Some(bytes))` on success, `Ok(None)` when
    /// the endpoint answered but reported non-ok (caller falls back to the
    /// result URL), `Err` when the request or body cannot be used at all.
    async fn direct_download(&self, job: &JobId) -> Result<Option<Vec<u8>>>;

    /// One status call, returning the raw body.
    async fn status_body(&self, job: &JobId) -> Result<Value>;

    /// Raw (non-JSON) download of the converted file.
    async fn raw_download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetch the converted bytes: direct content first, and on a non-ok direct
/// response exactly one fallback status call followed by a raw download of
/// its `output.url`.
async fn fetch_with<S: FetchSteps + Sync>(steps: &S, job: &JobId) -> Result<Vec<u8>> {
    if let Some(bytes) = steps.direct_download(job).await? {
        return Ok(bytes);
    }

    let body = steps.status_body(job).await?;
    let url = result_url(&body)
        .ok_or_else(|| Error::Fetch("no result URL in fallback status response".to_string()))?;

    debug!(job = %job.0, url = %url, "downloading result from URL");
    steps.raw_download(&url).await
}

#[async_trait]
impl FetchSteps for ConvertioClient {
    async fn direct_download(&self, job: &JobId) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/convert/{}/dl", self.base_url, job.0);
        let body: Value = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("result request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("result response malformed: {e}")))?;

        if !status_ok(&body) {
            return Ok(None);
        }

        let content = body
            .get("data")
            .and_then(|d| d.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| Error::Fetch("result response missing data.content".to_string()))?;

        let bytes = BASE64
            .decode(content)
            .map_err(|e| Error::Fetch(format!("result content is not valid base64: {e}")))?;
        Ok(Some(bytes))
    }

    async fn status_body(&self, job: &JobId) -> Result<Value> {
        let url = format!("{}/convert/{}/status", self.base_url, job.0);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("fallback status request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("fallback status response malformed: {e}")))
    }

    async fn raw_download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("result download failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Fetch(format!(
                "result download failed: HTTP {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("result download failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ConversionPort for ConvertioClient {
    async fn submit(&self, file: &[u8], file_name: &str, output_format: &str) -> Result<JobId> {
        let payload = json!({
            "apikey": self.api_key,
            "input": "base64",
            "file": BASE64.encode(file),
            "filename": file_name,
            "outputformat": output_format,
        });

        let url = format!("{}/convert", self.base_url);
        let body: Value = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Submit(format!("submit request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Submit(format!("submit response malformed: {e}")))?;

        parse_submit_response(&body)
    }

    async fn poll_status(&self, job: &JobId) -> Result<PollOutcome> {
        let url = format!("{}/convert/{}/status", self.base_url, job.0);
        let resp = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(job = %job.0, error = %e, "status request failed");
                return Ok(PollOutcome::TransientError);
            }
        };

        match resp.json::<Value>().await {
            Ok(body) => Ok(parse_status_response(&body)),
            Err(e) => {
                warn!(job = %job.0, error = %e, "status response malformed");
                Ok(PollOutcome::TransientError)
            }
        }
    }

    async fn fetch_result(&self, job: &JobId) -> Result<Vec<u8>> {
        fetch_with(self, job).await
    }
}

fn status_ok(body: &Value) -> bool {
    body.get("status").and_then(|s| s.as_str()) == Some("ok")
}

fn parse_submit_response(body: &Value) -> Result<JobId> {
    if !status_ok(body) {
        let error = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("provider rejected the request");
        return Err(Error::Submit(error.to_string()));
    }

    body.get("data")
        .and_then(|d| d.get("id"))
        .and_then(|id| id.as_str())
        .map(|id| JobId(id.to_string()))
        .ok_or_else(|| Error::Submit("submit response missing data.id".to_string()))
}

/// Interpret a status body. Only an explicit `finish`/`failed` step is
/// terminal; a non-ok or unrecognized body counts as a transient error so the
/// caller keeps polling.
fn parse_status_response(body: &Value) -> PollOutcome {
    if !status_ok(body) {
        return PollOutcome::TransientError;
    }

    let step = body
        .get("data")
        .and_then(|d| d.get("step"))
        .and_then(|s| s.as_str());

    match step {
        Some("finish") => PollOutcome::Finished {
            url: result_url(body),
        },
        Some("failed") => PollOutcome::Failed,
        Some(_) => PollOutcome::InProgress,
        None => PollOutcome::TransientError,
    }
}

fn result_url(body: &Value) -> Option<String> {
    if !status_ok(body) {
        return None;
    }
    body.get("data")
        .and_then(|d| d.get("output"))
        .and_then(|o| o.get("url"))
        .and_then(|u| u.as_str())
        .map(|u| u.to_string())
}
