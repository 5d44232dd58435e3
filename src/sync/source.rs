//! Where remote sheet data comes from.

use crate::error::{ReceiptError, Result};
use crate::record::display_value;
use crate::sheet::Table;
use serde_json::Value;
use std::time::Duration;

/// Header and data rows as published by the remote sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RemoteSheet {
    /// Parse the endpoint's `{"headers": [...], "rows": [[...], ...]}` payload.
    ///
    /// A missing `headers` or `rows` key degrades to an empty list.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not an object, or a present key does
    /// not hold a list (of lists, for `rows`).
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let Some(object) = payload.as_object() else {
            return Err(malformed("payload is not a JSON object"));
        };

        let headers = match object.get("headers") {
            Some(Value::Array(cells)) => cells.iter().map(display_value).collect(),
            Some(_) => return Err(malformed("\"headers\" is not a list")),
            None => {
                tracing::warn!("Remote payload has no \"headers\", treating as empty");
                Vec::new()
            }
        };

        let rows = match object.get("rows") {
            Some(Value::Array(rows)) => rows
                .iter()
                .map(|row| match row {
                    Value::Array(cells) => Ok(cells.clone()),
                    _ => Err(malformed("a row is not a list")),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(malformed("\"rows\" is not a list")),
            None => {
                tracing::warn!("Remote payload has no \"rows\", treating as empty");
                Vec::new()
            }
        };

        Ok(Self { headers, rows })
    }

    /// Table of the sheet, with short rows padded by empty cells.
    ///
    /// Rows wider than the header are kept as they are, so writing the
    /// table still rejects them.
    pub fn into_table(self) -> Table {
        let width = self.headers.len();
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, Value::Null);
                }
                row
            })
            .collect();
        Table::new(self.headers, rows)
    }
}

fn malformed(reason: &str) -> ReceiptError {
    ReceiptError::Http(format!("Malformed remote payload: {reason}"))
}

/// A place the current sheet contents can be fetched from.
pub trait SheetSource {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Fetch the complete sheet.
    ///
    /// # Errors
    ///
    /// Returns error if the sheet cannot be retrieved or parsed.
    fn fetch(&self) -> Result<RemoteSheet>;
}

/// Fetches the sheet from a JSON web endpoint with a single blocking GET.
#[derive(Debug, Clone)]
pub struct HttpSheetSource {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpSheetSource {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl SheetSource for HttpSheetSource {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    fn fetch(&self) -> Result<RemoteSheet> {
        let payload: Value = self
            .client
            .get(&self.endpoint)
            .send()?
            .error_for_status()?
            .json()?;
        RemoteSheet::from_payload(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_parses() {
        let sheet = RemoteSheet::from_payload(&json!({
            "headers": ["Name", "Amount", "Last Updated"],
            "rows": [["Alice", 5000, "2024-01-01T09:00:00"]],
        }))
        .unwrap();

        assert_eq!(sheet.headers, ["Name", "Amount", "Last Updated"]);
        assert_eq!(sheet.rows, vec![vec![json!("Alice"), json!(5000), json!("2024-01-01T09:00:00")]]);
    }

    #[test]
    fn test_missing_keys_degrade_to_empty() {
        let sheet = RemoteSheet::from_payload(&json!({ "error": "quota" })).unwrap();
        assert_eq!(sheet, RemoteSheet::default());
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(RemoteSheet::from_payload(&json!([1, 2])).is_err());
        assert!(RemoteSheet::from_payload(&json!({ "headers": "Name" })).is_err());
        assert!(RemoteSheet::from_payload(&json!({ "headers": [], "rows": [1] })).is_err());
    }

    #[test]
    fn test_into_table_pads_short_rows() {
        let table = RemoteSheet {
            headers: ["Name", "Amount", "Last Updated"].map(str::to_owned).to_vec(),
            rows: vec![vec![json!("A"), json!(1), json!("t1")], vec![json!("B")]],
        }
        .into_table();

        assert_eq!(table.ragged_row(), None);
        assert_eq!(table.rows[1], vec![json!("B"), Value::Null, Value::Null]);
    }

    #[test]
    fn test_http_source_unreachable_is_error() {
        let source = HttpSheetSource::new("http://127.0.0.1:9/sheet", Duration::from_secs(2)).unwrap();
        assert_eq!(source.describe(), "http://127.0.0.1:9/sheet");
        assert!(matches!(source.fetch(), Err(ReceiptError::Http(_))));
    }
}
