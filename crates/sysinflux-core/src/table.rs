//! Measurement tables.
//!
//! A [`Table`] is what every sampler produces, what the rate normalizer diffs
//! and what sinks receive. It serializes to the InfluxDB 0.8 series object:
//!
//! ```json
//! {"name": "host.load", "columns": ["one", "five", "fifteen"], "points": [[0.15, 0.1, 0.05]]}
//! ```

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// A single cell.
///
/// Integer variants keep their native width so that counter deltas are
/// computed (and truncated) the same way the source reported them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F64(f64),
}

impl Value {
    /// Returns true for the variants that take part in delta arithmetic.
    pub fn is_integer(&self) -> bool {
        !matches!(self, Value::Text(_) | Value::F64(_))
    }

    /// Returns the value as `u64` when it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v),
            Value::I8(v) => u64::try_from(v).ok(),
            Value::I16(v) => u64::try_from(v).ok(),
            Value::I32(v) => u64::try_from(v).ok(),
            Value::I64(v) => u64::try_from(v).ok(),
            Value::Text(_) | Value::F64(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(v) => f.write_str(v),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

// Cells go over the wire as bare JSON scalars, not as tagged enums.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(v) => serializer.serialize_str(v),
            Value::I8(v) => serializer.serialize_i8(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U8(v) => serializer.serialize_u8(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
        }
    }
}

struct ValueVisitor;

impl Visitor<'_> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::U64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(match u64::try_from(v) {
            Ok(u) => Value::U64(u),
            Err(_) => Value::I64(v),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::F64(v))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// A row whose arity does not match the table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeError {
    pub table: String,
    pub row: usize,
    pub expected: usize,
    pub got: usize,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table {}: row {} has {} values, expected {}",
            self.table, self.row, self.got, self.expected
        )
    }
}

impl std::error::Error for ShapeError {}

/// A named set of rows sharing one column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(rename = "points")]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, rejecting it if its arity differs from the columns.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ShapeError> {
        if row.len() != self.columns.len() {
            return Err(self.shape_error(self.rows.len(), row.len()));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Checks the arity invariant on every row.
    pub fn validate(&self) -> Result<(), ShapeError> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(self.shape_error(i, row.len()));
            }
        }
        Ok(())
    }

    /// Adds a column holding the same value in every row.
    pub fn append_column(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push(column.into());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a cell by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)
    }

    fn shape_error(&self, row: usize, got: usize) -> ShapeError {
        ShapeError {
            table: self.name.clone(),
            row,
            expected: self.columns.len(),
            got,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disks_table() -> Table {
        let mut table = Table::new("web01.disks", &["device", "read_ios", "in_flight"]);
        table
            .push_row(vec!["sda".into(), Value::U64(12345), Value::U64(0)])
            .unwrap();
        table
            .push_row(vec!["nvme0n1".into(), Value::U64(50000), Value::U64(5)])
            .unwrap();
        table
    }

    #[test]
    fn test_push_row_rejects_wrong_arity() {
        let mut table = Table::new("web01.load", &["one", "five", "fifteen"]);
        let err = table
            .push_row(vec![Value::F64(0.1), Value::F64(0.2)])
            .unwrap_err();

        assert_eq!(err.expected, 3);
        assert_eq!(err.got, 2);
        assert_eq!(err.row, 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_validate_catches_hand_built_rows() {
        let mut table = disks_table();
        assert!(table.validate().is_ok());

        table.rows.push(vec!["sdb".into()]);
        let err = table.validate().unwrap_err();
        assert_eq!(err.row, 2);
        assert_eq!(err.table, "web01.disks");
    }

    #[test]
    fn test_append_column_extends_every_row() {
        let mut table = disks_table();
        table.append_column("fqdn", "web01.example.com".into());

        assert_eq!(table.columns.last().map(String::as_str), Some("fqdn"));
        assert!(table.validate().is_ok());
        assert_eq!(
            table.get(1, "fqdn"),
            Some(&Value::Text("web01.example.com".into()))
        );
    }

    #[test]
    fn test_serialized_form_is_influx_series() {
        let mut table = Table::new("web01.load", &["one", "five", "fifteen"]);
        table
            .push_row(vec![Value::F64(0.15), Value::F64(0.1), Value::F64(0.05)])
            .unwrap();

        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(
            json,
            r#"{"name":"web01.load","columns":["one","five","fifteen"],"points":[[0.15,0.1,0.05]]}"#
        );
    }

    #[test]
    fn test_serde_round_trip_preserves_table() {
        let mut table = disks_table();
        table.append_column("fqdn", "web01.example.com".into());
        let mut uptime = Table::new("web01.uptime", &["length"]);
        uptime.push_row(vec![Value::F64(12345.0)]).unwrap();

        let batch = vec![table, uptime];
        let json = serde_json::to_string(&batch).unwrap();
        let parsed: Vec<Table> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, batch);
        assert_eq!(parsed[0].columns, ["device", "read_ios", "in_flight", "fqdn"]);
    }

    #[test]
    fn test_deserialize_scalars() {
        let parsed: Vec<Value> = serde_json::from_str(r#"["eth0", 42, -7, 1.5]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Value::Text("eth0".into()),
                Value::U64(42),
                Value::I64(-7),
                Value::F64(1.5),
            ]
        );
        assert!(serde_json::from_str::<Value>("true").is_err());
    }

    #[test]
    fn test_value_helpers() {
        assert!(Value::U8(3).is_integer());
        assert!(Value::I64(-3).is_integer());
        assert!(!Value::F64(1.0).is_integer());
        assert!(!Value::Text("x".into()).is_integer());
        assert_eq!(Value::I16(-1).as_u64(), None);
        assert_eq!(Value::U32(7).as_u64(), Some(7));
        assert_eq!(Value::Text("cpu".into()).as_str(), Some("cpu"));
        assert_eq!(Value::U64(10).to_string(), "10");
    }
}
