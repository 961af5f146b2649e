use crate::types::SqlValue;

/// A single fetched row. Column order is the order the engine returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Gets a value by column name. `None` if the column does not exist.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Gets a value by position.
    pub fn index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Column names, in engine order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cell values, in column order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A materialized result snapshot: the whole row set of one query, with its
/// column ordering intact. This is what gets handed to the cache collaborator
/// when a result is stored instead of kept live.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    /// Column names in engine order
    pub columns: Vec<String>,
    /// Rows, each a vector of values in column order
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Builds the `Row` at `index`, or `None` past the end.
    pub fn row(&self, index: usize) -> Option<Row> {
        self.rows
            .get(index)
            .map(|values| Row::new(self.columns.clone(), values.clone()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowSet {
        RowSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![SqlValue::Int32(1), SqlValue::from("Alice")],
                vec![SqlValue::Int32(2), SqlValue::from("Bob")],
            ],
        )
    }

    #[test]
    fn row_get_by_name_and_index() {
        let row = sample().row(0).unwrap();
        assert_eq!(row.get("id"), Some(&SqlValue::Int32(1)));
        assert_eq!(row.get("name"), Some(&SqlValue::Text("Alice".into())));
        assert_eq!(row.index(1), Some(&SqlValue::Text("Alice".into())));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn row_preserves_column_order() {
        let row = sample().row(1).unwrap();
        assert_eq!(row.columns(), &["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn rowset_row_past_end_is_none() {
        assert!(sample().row(2).is_none());
        assert!(RowSet::empty().row(0).is_none());
    }
}
