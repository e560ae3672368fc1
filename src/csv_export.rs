use std::fs;
use std::path::Path;

use crate::types::Result;

/// One declared CSV column: the record field id and the header title.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub id: &'static str,
    pub title: &'static str,
}

impl Column {
    pub const fn new(id: &'static str, title: &'static str) -> Self {
        Self { id, title }
    }
}

/// A report row that can be flattened into CSV cells by column id.
pub trait CsvRecord {
    fn field(&self, id: &str) -> Option<String>;
}

/// Writes `rows` under a header of column titles. Missing fields become empty cells.
pub fn write_csv<R: CsvRecord>(path: &Path, columns: &[Column], rows: &[R]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter().map(|c| c.title))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| row.field(c.id).unwrap_or_default()))?;
    }
    writer.flush()?;

    log::info!(
        "[csv_export::write_csv] Wrote {} rows to {}",
        rows.len(),
        path.display()
    );
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        name: &'static str,
        value: Option<f64>,
    }

    impl CsvRecord for Row {
        fn field(&self, id: &str) -> Option<String> {
            match id {
                "name" => Some(self.name.to_string()),
                "value" => self.value.map(|v| v.to_string()),
                _ => None,
            }
        }
    }

    const COLUMNS: &[Column] = &[
        Column::new("name", "Name"),
        Column::new("value", "Value"),
        Column::new("note", "Note"),
    ];

    #[test]
    fn test_header_and_row_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let rows = vec![
            Row { name: "a", value: Some(1.5) },
            Row { name: "b", value: None },
            Row { name: "c", value: Some(3.0) },
        ];

        let written = write_csv(&path, COLUMNS, &rows).unwrap();
        assert_eq!(written, 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["Name", "Value", "Note"]);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.len() == COLUMNS.len()));
        assert_eq!(&records[0][1], "1.5");
        assert_eq!(&records[1][1], "");
        assert_eq!(&records[2][2], "");
    }

    #[test]
    fn test_empty_rows_still_write_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv::<Row>(&path, COLUMNS, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), "Name,Value,Note");
    }
}
