//! Google Sheets HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). One client is bound
//! to one spreadsheet. Transient failures (429, 5xx, network) are retried
//! with a fixed delay; a 401 triggers one token refresh when refresh
//! credentials are available.

use std::ops::Range;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use url::Url;

use revsheet_recon::{CellValue, ReconError, SheetMeta, SpreadsheetApi};

use crate::auth::{refresh_access_token, TokenSource};
use crate::error::SheetsError;
use crate::wire;

// ── Constants ───────────────────────────────────────────────────────

pub const API_BASE: &str = "https://sheets.googleapis.com";
pub const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = concat!("revsheet/", env!("CARGO_PKG_VERSION"));

/// Sheets API client bound to one spreadsheet (blocking).
pub struct SheetsClient {
    http: Client,
    api_base: String,
    token_url: String,
    spreadsheet_id: String,
    tokens: TokenSource,
    retry_delay: Duration,
}

impl SheetsClient {
    /// Client against Google; tokens are minted at the credentials' own
    /// token endpoint.
    pub fn new(spreadsheet_id: impl Into<String>, tokens: TokenSource) -> Result<Self, SheetsError> {
        let token_url = tokens.token_uri().to_string();
        Self::with_endpoints(spreadsheet_id, tokens, API_BASE, &token_url)
    }

    /// Client against other endpoints (tests, proxies).
    pub fn with_endpoints(
        spreadsheet_id: impl Into<String>,
        tokens: TokenSource,
        api_base: &str,
        token_url: &str,
    ) -> Result<Self, SheetsError> {
        if tokens.is_empty() {
            return Err(SheetsError::Credentials(
                "no access token and no refresh credentials".to_string(),
            ));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
            retry_delay: Duration::from_secs(2),
        })
    }

    /// Pause between transient-failure retries (when no Retry-After is sent).
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn spreadsheet_url(&self, suffix: &str) -> String {
        format!("{}/v4/spreadsheets/{}{}", self.api_base, self.spreadsheet_id, suffix)
    }

    fn values_url(&self, range: &str) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.spreadsheet_url(""))
            .map_err(|e| SheetsError::Parse(format!("bad API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Parse("API URL cannot take a path".to_string()))?
            .push("values")
            .push(range);
        Ok(url)
    }

    fn refresh(&mut self) -> Result<String, SheetsError> {
        let credentials = self.tokens.refresh.as_ref().ok_or_else(|| {
            SheetsError::Auth("access token rejected and no refresh credentials".into())
        })?;
        debug!("refreshing Google access token");
        let token = refresh_access_token(credentials, &self.http, &self.token_url)?;
        self.tokens.access_token = Some(token.clone());
        Ok(token)
    }

    fn access_token(&mut self) -> Result<String, SheetsError> {
        match &self.tokens.access_token {
            Some(t) => Ok(t.clone()),
            None => self.refresh(),
        }
    }

    /// Send a request with auth, refresh-on-401 and transient retries.
    ///
    /// `build` is called once per attempt with the client and a bearer token.
    fn send(
        &mut self,
        build: impl Fn(&Client, &str) -> RequestBuilder,
    ) -> Result<Value, SheetsError> {
        let mut token = self.access_token()?;
        let mut refreshed = false;
        let mut attempt = 0u32;

        loop {
            let result = build(&self.http, &token).send();
            let resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(SheetsError::Network(format!(
                            "{e} (after {} attempts)",
                            attempt + 1
                        )));
                    }
                    attempt += 1;
                    warn!("Sheets API retry {attempt}/{MAX_RETRIES} ({e})");
                    thread::sleep(self.retry_delay);
                    continue;
                }
            };

            let status = resp.status().as_u16();

            if status == 401 && !refreshed && self.tokens.can_refresh() {
                token = self.refresh()?;
                refreshed = true;
                continue;
            }

            if status == 401 || status == 403 {
                let body: Value = resp.json().unwrap_or(Value::Null);
                return Err(SheetsError::Auth(format!("{status}: {}", wire::error_message(&body, status))));
            }

            if status == 429 || status >= 500 {
                if attempt >= MAX_RETRIES {
                    let body: Value = resp.json().unwrap_or(Value::Null);
                    return Err(SheetsError::Http(status, wire::error_message(&body, status)));
                }
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(self.retry_delay);
                attempt += 1;
                warn!(
                    "Sheets API retry {attempt}/{MAX_RETRIES} in {}s (HTTP {status})",
                    wait.as_secs()
                );
                thread::sleep(wait);
                continue;
            }

            if status >= 400 {
                let body: Value = resp.json().unwrap_or(Value::Null);
                return Err(SheetsError::Http(status, wire::error_message(&body, status)));
            }

            let text = resp
                .text()
                .map_err(|e| SheetsError::Parse(format!("cannot read response body: {e}")))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| {
                let head: String = text.chars().take(200).collect();
                SheetsError::Parse(format!("{e} (body: {head})"))
            });
        }
    }

    fn batch_update(&mut self, requests: Vec<Value>) -> Result<Value, SheetsError> {
        let url = self.spreadsheet_url(":batchUpdate");
        let body = json!({ "requests": requests });
        self.send(|http, token| http.post(&url).bearer_auth(token).json(&body))
    }

    // ── Operations ──────────────────────────────────────────────────

    pub fn list_sheets(&mut self) -> Result<Vec<SheetMeta>, SheetsError> {
        let url = self.spreadsheet_url("");
        let body = self.send(|http, token| {
            http.get(&url).bearer_auth(token).query(&[(
                "fields",
                "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))",
            )])
        })?;
        wire::sheets_from_json(&body)
    }

    pub fn create_sheet(&mut self, title: &str, rows: u32, columns: u32) -> Result<SheetMeta, SheetsError> {
        let body = self.batch_update(vec![wire::add_sheet_request(title, rows, columns)])?;
        wire::sheet_meta(&body["replies"][0]["addSheet"]["properties"])
    }

    pub fn get_values(&mut self, title: &str, range: &str) -> Result<Vec<Vec<CellValue>>, SheetsError> {
        let url = self.values_url(&wire::a1_range(title, range))?;
        let body = self.send(|http, token| {
            http.get(url.clone())
                .bearer_auth(token)
                .query(&[("valueRenderOption", "FORMULA"), ("majorDimension", "ROWS")])
        })?;
        Ok(wire::rows_from_json(&body))
    }

    pub fn update_value(&mut self, title: &str, cell: &str, value: &CellValue) -> Result<(), SheetsError> {
        let range = wire::a1_range(title, cell);
        let url = self.values_url(&range)?;
        let (value, input_option) = wire::value_input(value);
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": [[value]] });
        self.send(|http, token| {
            http.put(url.clone())
                .bearer_auth(token)
                .query(&[("valueInputOption", input_option)])
                .json(&body)
        })?;
        Ok(())
    }
}

fn api_err(operation: &'static str) -> impl Fn(SheetsError) -> ReconError {
    move |e| ReconError::api(operation, e.to_string())
}

impl SpreadsheetApi for SheetsClient {
    fn sheets(&mut self) -> Result<Vec<SheetMeta>, ReconError> {
        self.list_sheets().map_err(api_err("list sheets"))
    }

    fn add_sheet(&mut self, title: &str, rows: u32, columns: u32) -> Result<SheetMeta, ReconError> {
        let meta = self.create_sheet(title, rows, columns).map_err(api_err("add sheet"))?;
        info!("created sheet {title:?} ({rows}x{columns})");
        Ok(meta)
    }

    fn set_column_count(&mut self, sheet_id: i64, columns: u32) -> Result<(), ReconError> {
        self.batch_update(vec![wire::column_count_request(sheet_id, columns)])
            .map_err(api_err("resize grid"))?;
        Ok(())
    }

    fn read_values(&mut self, title: &str, range: &str) -> Result<Vec<Vec<CellValue>>, ReconError> {
        self.get_values(title, range).map_err(api_err("read values"))
    }

    fn write_grid(&mut self, sheet_id: i64, rows: &[Vec<CellValue>]) -> Result<(), ReconError> {
        self.batch_update(vec![wire::update_cells_request(sheet_id, rows)])
            .map_err(api_err("bulk write"))?;
        Ok(())
    }

    fn write_cell(&mut self, title: &str, cell: &str, value: &CellValue) -> Result<(), ReconError> {
        self.update_value(title, cell, value).map_err(api_err("write cell"))
    }

    fn format_currency(
        &mut self,
        sheet_id: i64,
        rows: Range<usize>,
        column: usize,
        pattern: &str,
    ) -> Result<(), ReconError> {
        self.batch_update(vec![wire::currency_format_request(sheet_id, &rows, column, pattern)])
            .map_err(api_err("format"))?;
        Ok(())
    }

    fn auto_resize_columns(&mut self, sheet_id: i64, columns: Range<usize>) -> Result<(), ReconError> {
        self.batch_update(vec![wire::auto_resize_request(sheet_id, &columns)])
            .map_err(api_err("auto-resize"))?;
        Ok(())
    }
}
