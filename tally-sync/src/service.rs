//! HTTP client for the external receipt/classification service.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::multipart::{Form, Part};
use tally_ingest::{ExternalExpense, ReceiptExtraction, decode_rows, parse_upload_body};
use tracing::debug;

/// Read side of the external service, plus its best-effort delete.
pub trait ExternalSource {
    fn fetch_expenses(&self) -> impl Future<Output = Result<Vec<ExternalExpense>>> + Send;
    fn delete_expense(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl ServiceClient {
    pub fn new(base_url: &str, user_id: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        })
    }

    pub fn expenses_url(&self) -> String {
        format!("{}/get-my-expenses/{}", self.base_url, self.user_id)
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    pub fn delete_url(&self, id: &str) -> String {
        format!("{}/delete-expense/{}/{}", self.base_url, self.user_id, id)
    }

    /// Upload a receipt image and validate the classification.
    ///
    /// A usable response with missing fields fails with an
    /// [`tally_ingest::UploadRejection`], which callers can downcast to
    /// show its message as-is.
    pub async fn upload_receipt(&self, image: &Path) -> Result<ReceiptExtraction> {
        let bytes = tokio::fs::read(image)
            .await
            .with_context(|| format!("read {}", image.display()))?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "receipt".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(image))?;
        let form = Form::new()
            .text("user_id", self.user_id.clone())
            .part("file", part);

        let resp = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .context("upload request")?;

        let status = resp.status();
        let body = resp.text().await.context("read upload response")?;
        if !status.is_success() {
            bail!("upload error: {status} {body}");
        }
        debug!(bytes = body.len(), "upload response received");
        Ok(parse_upload_body(&body)?)
    }
}

impl ExternalSource for ServiceClient {
    async fn fetch_expenses(&self) -> Result<Vec<ExternalExpense>> {
        let resp = self
            .http
            .get(self.expenses_url())
            .send()
            .await
            .context("external service request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("external service error: {status} {txt}");
        }

        let body = resp.text().await.context("read external expenses")?;
        decode_rows(&body, "external").context("parse external expenses")
    }

    async fn delete_expense(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.delete_url(id))
            .send()
            .await
            .context("external delete request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("external delete error: {status} {txt}");
        }
        Ok(())
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
