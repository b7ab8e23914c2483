//! Recorded sweep data.
//!
//! - [`repository`]: the append-only, run-tagged log written by the runner
//! - [`table`]: forward-filled rectangular view for exporters

pub mod repository;
pub mod table;

pub use repository::{DataRepository, DataRow, RunTag, Timestamps};
pub use table::{flatten, Table};

/// Result dictionary returned by a `configure` or `observe` call.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Convert a JSON value into [`Fields`]; non-objects are stored under `"value"`.
pub fn into_fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = Fields::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
