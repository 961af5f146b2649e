mod row;
mod sql_value;

pub use row::{Row, RowSet};
pub use sql_value::SqlValue;
