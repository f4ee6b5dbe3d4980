//! Text-protocol rows and buffered result sets.

use minimysql_core::{Error, ProtocolError, Result};
use serde::Serialize;

use crate::protocol::{OkPacket, lenenc};
use crate::types::FieldDescriptor;

/// One row packet, read column by column.
///
/// The payload is a run of length-coded strings, one per column in field
/// order. Each call to [`next_value`](Self::next_value) consumes one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    payload: Vec<u8>,
    pos: usize,
    column_count: usize,
}

impl Row {
    pub fn new(payload: Vec<u8>, column_count: usize) -> Self {
        Self {
            payload,
            pos: 0,
            column_count,
        }
    }

    /// Number of columns the result set header announced.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Raw row payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Whether every column has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.payload.len()
    }

    /// Next column's raw bytes; `None` for SQL NULL.
    pub fn next_value(&mut self) -> Result<Option<&[u8]>> {
        if self.is_exhausted() {
            return Err(row_error("Row has no more columns", &self.payload));
        }
        let Some((value, next)) = lenenc::read_lenenc_bytes(&self.payload, self.pos) else {
            return Err(row_error("Truncated column value", &self.payload));
        };
        self.pos = next;
        Ok(value)
    }

    /// Next column as text; `None` for SQL NULL.
    pub fn next_string(&mut self) -> Result<Option<String>> {
        Ok(self
            .next_value()?
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Decode every remaining column.
    pub fn values(&mut self) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(self.column_count);
        while !self.is_exhausted() {
            values.push(self.next_string()?);
        }
        if values.len() != self.column_count {
            return Err(row_error(
                format!(
                    "Row carries {} columns, header announced {}",
                    values.len(),
                    self.column_count
                ),
                &self.payload,
            ));
        }
        Ok(values)
    }
}

fn row_error(msg: impl Into<String>, payload: &[u8]) -> Error {
    Error::Protocol(ProtocolError {
        message: msg.into(),
        raw_data: Some(payload.to_vec()),
        source: None,
    })
}

/// A fully read result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub fields: Vec<FieldDescriptor>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    /// Column names in field order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Index of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Value at `row`, `column`. `None` when out of range or NULL.
    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of [`MySqlConnection::query`](crate::MySqlConnection::query).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueryResult {
    /// The statement produced a result set
    Rows(ResultSet),
    /// The statement completed without one
    Done(OkPacket),
}

impl QueryResult {
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(set) => Some(set),
            QueryResult::Done(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            QueryResult::Rows(set) => Some(set),
            QueryResult::Done(_) => None,
        }
    }

    /// Affected row count; 0 for result sets.
    pub fn affected_rows(&self) -> u64 {
        match self {
            QueryResult::Rows(_) => 0,
            QueryResult::Done(ok) => ok.affected_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::field_payload;

    #[test]
    fn test_row_values() {
        let payload = vec![0x01, b'1', 0xFB, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o'];
        let mut row = Row::new(payload, 4);

        assert_eq!(row.next_string().unwrap(), Some("1".to_string()));
        assert_eq!(row.next_value().unwrap(), None);
        assert_eq!(row.next_value().unwrap(), Some(&b""[..]));
        assert_eq!(row.next_string().unwrap(), Some("hello".to_string()));
        assert!(row.is_exhausted());
        assert!(matches!(row.next_value(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_row_wide_length_prefix() {
        // 300-byte column behind the 0xFC escape
        let mut payload = vec![0xFC, 0x2C, 0x01];
        payload.extend(std::iter::repeat_n(b'x', 300));
        let mut row = Row::new(payload, 1);

        let values = row.values().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_ref().map(String::len), Some(300));
    }

    #[test]
    fn test_row_truncated_column() {
        let mut row = Row::new(vec![0x05, b'a', b'b'], 1);
        match row.next_value() {
            Err(Error::Protocol(e)) => assert_eq!(e.raw_data, Some(vec![0x05, b'a', b'b'])),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_row_column_count_mismatch() {
        let mut row = Row::new(vec![0x01, b'a', 0x01, b'b'], 1);
        assert!(row.values().is_err());

        let mut row = Row::new(vec![0x01, b'a'], 2);
        assert!(row.values().is_err());
    }

    #[test]
    fn test_result_set_lookup() {
        let set = ResultSet {
            fields: vec![
                FieldDescriptor::parse(&field_payload("db", "t", "id", 0x03, 0)).unwrap(),
                FieldDescriptor::parse(&field_payload("db", "t", "note", 0xFD, 0)).unwrap(),
            ],
            rows: vec![
                vec![Some("1".to_string()), None],
                vec![Some("2".to_string()), Some("warm".to_string())],
            ],
        };

        assert_eq!(set.column_names(), vec!["id", "note"]);
        assert_eq!(set.column_index("note"), Some(1));
        assert_eq!(set.get(1, 1), Some("warm"));
        assert_eq!(set.get(0, 1), None);
        assert_eq!(set.get(5, 0), None);
        assert_eq!(set.len(), 2);

        let result = QueryResult::Rows(set);
        assert_eq!(result.affected_rows(), 0);
        assert!(result.rows().is_some());
    }
}
