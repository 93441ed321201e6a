//! `TabularStore` over the Sheets v4 REST API

use crate::config::{SheetsConfig, SheetsConfigError};
use crate::wire::{
    delete_row_body, failure, AppendValuesResponse, BatchUpdateValuesBody,
    BatchUpdateValuesResponse, RowBody, Spreadsheet, ValueRange,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use tabula_codec::CellRange;
use tabula_repository::{RangeUpdate, StoreError, TableId, TabularStore};
use tracing::{debug, warn};

/// One spreadsheet, one table per sheet
#[derive(Clone)]
pub struct SheetsStore {
    client: Client,
    spreadsheet: Url,
    token: String,
}

impl fmt::Debug for SheetsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsStore")
            .field("spreadsheet", &self.spreadsheet.as_str())
            .finish_non_exhaustive()
    }
}

impl SheetsStore {
    /// Build a client for the configured spreadsheet
    ///
    /// # Errors
    /// Missing spreadsheet id or token, bad base URL, client construction.
    pub fn new(config: &SheetsConfig) -> Result<Self, SheetsConfigError> {
        config.validate()?;
        let token = config.resolve_token()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Self::with_client(client, config, token)
    }

    /// Use an existing HTTP client
    ///
    /// # Errors
    /// Missing spreadsheet id, bad base URL.
    pub fn with_client(
        client: Client,
        config: &SheetsConfig,
        token: String,
    ) -> Result<Self, SheetsConfigError> {
        config.validate()?;
        let spreadsheet = spreadsheet_url(&config.base_url, &config.spreadsheet_id)?;
        Ok(Self {
            client,
            spreadsheet,
            token,
        })
    }

    /// `…/{id}/values/{range}[suffix]`
    fn values_url(&self, range: &CellRange, suffix: &str) -> Url {
        let segment = format!("{range}{suffix}");
        self.child_url(&["values", segment.as_str()])
    }

    fn child_url(&self, segments: &[&str]) -> Url {
        let mut url = self.spreadsheet.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `…/{id}{suffix}`, for `:batchUpdate`-style methods on the spreadsheet
    fn method_url(&self, suffix: &str) -> Url {
        let mut url = self.spreadsheet.clone();
        let path = format!("{}{suffix}", url.path());
        url.set_path(&path);
        url
    }

    async fn send<T: DeserializeOwned + Default>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        if !status.is_success() {
            let err = failure(status.as_u16(), &body);
            debug!(operation, status = status.as_u16(), error = %err, "sheets request failed");
            return Err(err);
        }
        if body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&body).map_err(|err| {
            warn!(operation, error = %err, "unreadable sheets response");
            StoreError::Malformed(format!("{operation}: {err}"))
        })
    }
}

fn spreadsheet_url(base_url: &str, spreadsheet_id: &str) -> Result<Url, SheetsConfigError> {
    let invalid = |reason: String| SheetsConfigError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };
    let mut url = Url::parse(base_url).map_err(|err| invalid(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .push(spreadsheet_id.trim());
    Ok(url)
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn get_range(&self, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url(range, "");
        let values: ValueRange = self.send("get_range", self.client.get(url)).await?;
        Ok(values.into_rows())
    }

    async fn append_row(
        &self,
        anchor: &CellRange,
        values: Vec<String>,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let mut url = self.values_url(anchor, ":append");
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS")
            .append_pair("includeValuesInResponse", "true");
        let response: AppendValuesResponse = self
            .send("append_row", self.client.post(url).json(&RowBody::new(None, values)))
            .await?;
        Ok(response.echoed_row())
    }

    async fn update_range(&self, range: &CellRange, values: Vec<String>) -> Result<(), StoreError> {
        let mut url = self.values_url(range, "");
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = RowBody::new(Some(range.to_string()), values);
        let _: serde_json::Value = self
            .send("update_range", self.client.put(url).json(&body))
            .await?;
        Ok(())
    }

    async fn batch_update(
        &self,
        table: &str,
        updates: Vec<RangeUpdate>,
    ) -> Result<u64, StoreError> {
        let url = self.child_url(&["values:batchUpdate"]);
        let count = updates.len();
        let body = BatchUpdateValuesBody::raw(updates);
        let response: BatchUpdateValuesResponse = self
            .send("batch_update", self.client.post(url).json(&body))
            .await?;
        debug!(table, ranges = count, cells = response.total_updated_cells, "batch written");
        Ok(response.total_updated_cells)
    }

    async fn describe_table(&self, table: &str) -> Result<TableId, StoreError> {
        let mut url = self.spreadsheet.clone();
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let spreadsheet: Spreadsheet = self.send("describe_table", self.client.get(url)).await?;
        spreadsheet
            .sheet_id(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    async fn delete_row(&self, table: &str, table_id: TableId, row: u32) -> Result<(), StoreError> {
        let url = self.method_url(":batchUpdate");
        let _: serde_json::Value = self
            .send("delete_row", self.client.post(url).json(&delete_row_body(table_id, row)))
            .await?;
        debug!(table, row, "row deleted");
        Ok(())
    }
}
