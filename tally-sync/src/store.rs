//! Relational expense table behind a PostgREST-style HTTP API.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use tally_ingest::{RelationalInsert, RelationalRow, decode_rows};
use uuid::Uuid;

/// Owner-scoped access to the relational expense table.
pub trait RelationalSource {
    /// All rows for the owner, newest `created_at` first.
    fn select_expenses(&self) -> impl Future<Output = Result<Vec<RelationalRow>>> + Send;
    fn insert_expense(&self, row: &RelationalInsert) -> impl Future<Output = Result<RelationalRow>> + Send;
    fn delete_expense(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    table: String,
    owner_id: String,
}

#[derive(Serialize)]
struct OwnedInsert<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    row: &'a RelationalInsert,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        owner_id: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(api_key)?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {api_key}"))?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            owner_id: owner_id.to_string(),
        })
    }

    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn owner_filter(&self) -> String {
        format!("eq.{}", self.owner_id)
    }
}

impl RelationalSource for RestStore {
    async fn select_expenses(&self) -> Result<Vec<RelationalRow>> {
        let resp = self
            .http
            .get(self.table_url())
            .query(&[
                ("select", "*".to_string()),
                ("user_id", self.owner_filter()),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await
            .context("relational store request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("relational store error: {status} {txt}");
        }

        let body = resp.text().await.context("read relational rows")?;
        decode_rows(&body, "relational").context("parse relational rows")
    }

    async fn insert_expense(&self, row: &RelationalInsert) -> Result<RelationalRow> {
        let body = OwnedInsert {
            user_id: &self.owner_id,
            row,
        };
        let resp = self
            .http
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .context("relational insert request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("relational insert error: {status} {txt}");
        }

        let rows: Vec<RelationalRow> = resp.json().await.context("parse inserted row")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("relational insert returned no row"))
    }

    async fn delete_expense(&self, id: Uuid) -> Result<()> {
        let resp = self
            .http
            .delete(self.table_url())
            .query(&[
                ("id", format!("eq.{}", id.hyphenated())),
                ("user_id", self.owner_filter()),
            ])
            .send()
            .await
            .context("relational delete request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("relational delete error: {status} {txt}");
        }
        Ok(())
    }
}
