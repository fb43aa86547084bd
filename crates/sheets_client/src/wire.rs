//! JSON shapes of the Sheets v4 API used by the client.

use std::ops::Range;

use serde_json::{json, Value};

use revsheet_recon::{CellValue, SheetMeta};

use crate::error::SheetsError;

/// `'Title'!A1:B2` with embedded quotes doubled.
pub fn a1_range(title: &str, range: &str) -> String {
    format!("'{}'!{range}", title.replace('\'', "''"))
}

/// A value from `values.get` with `valueRenderOption=FORMULA`.
pub fn cell_from_json(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Number(n) => n.as_f64().map_or(CellValue::Empty, CellValue::Number),
        Value::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Value::String(s) if s.is_empty() => CellValue::Empty,
        Value::String(s) if s.starts_with('=') => CellValue::Formula(s.clone()),
        Value::String(s) => CellValue::text(s.as_str()),
        other => CellValue::text(other.to_string()),
    }
}

pub fn rows_from_json(body: &Value) -> Vec<Vec<CellValue>> {
    body["values"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| row.as_array().map_or_else(Vec::new, |r| r.iter().map(cell_from_json).collect()))
                .collect()
        })
        .unwrap_or_default()
}

/// `CellData` for `updateCells`. Empty cells clear the stored value.
pub fn cell_data(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => json!({}),
        CellValue::Text(s) => json!({ "userEnteredValue": { "stringValue": s } }),
        CellValue::Number(n) => json!({ "userEnteredValue": { "numberValue": n } }),
        CellValue::Formula(f) => json!({ "userEnteredValue": { "formulaValue": f } }),
    }
}

/// Value for `values.update`, plus the input option it needs.
pub fn value_input(value: &CellValue) -> (Value, &'static str) {
    match value {
        CellValue::Empty => (json!(""), "RAW"),
        CellValue::Text(s) => (json!(s), "RAW"),
        CellValue::Number(n) => (json!(n), "RAW"),
        CellValue::Formula(f) => (json!(f), "USER_ENTERED"),
    }
}

pub fn sheet_meta(properties: &Value) -> Result<SheetMeta, SheetsError> {
    let sheet_id = properties["sheetId"]
        .as_i64()
        .ok_or_else(|| SheetsError::Parse("sheet without sheetId".to_string()))?;
    let title = properties["title"]
        .as_str()
        .ok_or_else(|| SheetsError::Parse(format!("sheet {sheet_id} without title")))?
        .to_string();
    let grid = &properties["gridProperties"];
    Ok(SheetMeta {
        sheet_id,
        title,
        row_count: grid["rowCount"].as_u64().unwrap_or(0) as u32,
        column_count: grid["columnCount"].as_u64().unwrap_or(0) as u32,
    })
}

pub fn sheets_from_json(body: &Value) -> Result<Vec<SheetMeta>, SheetsError> {
    body["sheets"]
        .as_array()
        .map(|sheets| sheets.iter().map(|s| sheet_meta(&s["properties"])).collect())
        .unwrap_or_else(|| Ok(Vec::new()))
}

// ── batchUpdate requests ────────────────────────────────────────────

pub fn add_sheet_request(title: &str, rows: u32, columns: u32) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "title": title,
                "gridProperties": { "rowCount": rows, "columnCount": columns }
            }
        }
    })
}

pub fn column_count_request(sheet_id: i64, columns: u32) -> Value {
    json!({
        "updateSheetProperties": {
            "properties": {
                "sheetId": sheet_id,
                "gridProperties": { "columnCount": columns }
            },
            "fields": "gridProperties.columnCount"
        }
    })
}

pub fn update_cells_request(sheet_id: i64, rows: &[Vec<CellValue>]) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|row| json!({ "values": row.iter().map(cell_data).collect::<Vec<_>>() }))
        .collect();
    json!({
        "updateCells": {
            "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0 },
            "rows": rows,
            "fields": "userEnteredValue"
        }
    })
}

pub fn currency_format_request(sheet_id: i64, rows: &Range<usize>, column: usize, pattern: &str) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": rows.start,
                "endRowIndex": rows.end,
                "startColumnIndex": column,
                "endColumnIndex": column + 1
            },
            "cell": {
                "userEnteredFormat": {
                    "numberFormat": { "type": "CURRENCY", "pattern": pattern }
                }
            },
            "fields": "userEnteredFormat.numberFormat"
        }
    })
}

pub fn auto_resize_request(sheet_id: i64, columns: &Range<usize>) -> Value {
    json!({
        "autoResizeDimensions": {
            "dimensions": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": columns.start,
                "endIndex": columns.end
            }
        }
    })
}

/// Best-effort message out of a Google error body.
pub fn error_message(body: &Value, status: u16) -> String {
    body["error"]["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {status}"))
}
