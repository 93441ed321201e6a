//! Sheets v4 request and response bodies

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabula_repository::{RangeUpdate, StoreError, TableId};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValueRange {
    #[serde(default)]
    pub(crate) values: Vec<Vec<Value>>,
}

impl ValueRange {
    pub(crate) fn into_rows(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateValuesResponse {
    pub(crate) updated_data: Option<ValueRange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppendValuesResponse {
    pub(crate) updates: Option<UpdateValuesResponse>,
}

impl AppendValuesResponse {
    /// First echoed row; `None` when the API did not include values
    pub(crate) fn echoed_row(self) -> Option<Vec<String>> {
        self.updates?.updated_data?.into_rows().into_iter().next()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchUpdateValuesResponse {
    #[serde(default)]
    pub(crate) total_updated_cells: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: TableId,
    title: String,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

impl Spreadsheet {
    pub(crate) fn sheet_id(&self, title: &str) -> Option<TableId> {
        self.sheets
            .iter()
            .find(|sheet| sheet.properties.title == title)
            .map(|sheet| sheet.properties.sheet_id)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RowBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) range: Option<String>,
    pub(crate) major_dimension: &'static str,
    pub(crate) values: Vec<Vec<String>>,
}

impl RowBody {
    pub(crate) fn new(range: Option<String>, row: Vec<String>) -> Self {
        Self {
            range,
            major_dimension: "ROWS",
            values: vec![row],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchUpdateValuesBody {
    pub(crate) value_input_option: &'static str,
    pub(crate) data: Vec<RowBody>,
}

impl BatchUpdateValuesBody {
    pub(crate) fn raw(updates: Vec<RangeUpdate>) -> Self {
        Self {
            value_input_option: "RAW",
            data: updates
                .into_iter()
                .map(|update| RowBody::new(Some(update.range.to_string()), update.values))
                .collect(),
        }
    }
}

/// `spreadsheets:batchUpdate` body removing one row
pub(crate) fn delete_row_body(table_id: TableId, row: u32) -> Value {
    let start = row.saturating_sub(1);
    serde_json::json!({
        "requests": [{
            "deleteDimension": {
                "range": {
                    "sheetId": table_id,
                    "dimension": "ROWS",
                    "startIndex": start,
                    "endIndex": start + 1,
                }
            }
        }]
    })
}

/// Cell value as the text the codec expects
fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Bool(flag) => String::from(if flag { "TRUE" } else { "FALSE" }),
        other => other.to_string(),
    }
}

/// Map a failed response to a store error, keeping the API message
pub(crate) fn failure(status: u16, body: &str) -> StoreError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    StoreError::remote(status, message)
}
