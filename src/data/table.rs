//! Flat, forward-filled table view of the data log.
//!
//! Exporters want rectangular data. Each nested `component -> field` pair found in
//! the first row becomes a `component_field` column. A row that lacks a component
//! (for example because a step failed half way) repeats the previous row's value
//! for that column.

use super::repository::DataRow;
use serde::Serialize;
use serde_json::Value;

/// Rectangular view of a set of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    /// Column names, `component_field`.
    pub columns: Vec<String>,
    /// One entry per row, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Index of `name` in [`columns`](Table::columns).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every value of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

/// Flatten `rows` into a [`Table`].
pub fn flatten(rows: &[DataRow]) -> Table {
    let objects: Vec<Value> = rows.iter().map(DataRow::to_json).collect();
    let Some(Value::Object(first)) = objects.first() else {
        return Table::default();
    };

    let header: Vec<(String, String)> = first
        .iter()
        .filter_map(|(key, value)| value.as_object().map(|inner| (key, inner)))
        .flat_map(|(key, inner)| inner.keys().map(move |sub| (key.clone(), sub.clone())))
        .collect();

    let mut table = Table {
        columns: header.iter().map(|(k, sub)| format!("{k}_{sub}")).collect(),
        rows: Vec::with_capacity(objects.len()),
    };

    for object in &objects {
        let previous = table.rows.last();
        let row = header
            .iter()
            .enumerate()
            .map(|(idx, (key, sub))| match object.get(key) {
                Some(component) => component.get(sub).cloned().unwrap_or(Value::Null),
                None => previous.map_or(Value::Null, |prev| prev[idx].clone()),
            })
            .collect();
        table.rows.push(row);
    }
    table
}
