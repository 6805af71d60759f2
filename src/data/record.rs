use std::{collections::HashMap, fs::File, io::Read, path::Path};

use anyhow::{anyhow, Context};

/// One row of the external table, keyed by the join column. Values are kept as the raw strings
/// read from the source; numeric conversion happens when joining.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    pub key: String,
    pub attributes: HashMap<String, String>,
}

impl AttributeRecord {
    pub fn new(key: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            key: key.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }
}

pub fn read_records_from_csv(
    filepath: &Path,
    key_column: &str,
) -> anyhow::Result<Vec<AttributeRecord>> {
    let file = File::open(filepath)
        .with_context(|| format!("Opening tabular data file {:?}", filepath))?;
    read_records(file, key_column)
        .with_context(|| format!("Reading tabular data from {:?}", filepath))
}

/// Read all rows of a headed CSV source. The key column is required; every other column becomes
/// an attribute of the record.
pub fn read_records<R: Read>(reader: R, key_column: &str) -> anyhow::Result<Vec<AttributeRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let key_index = headers
        .iter()
        .position(|header| header == key_column)
        .ok_or_else(|| anyhow!("Key column '{}' not found in header", key_column))?;

    let mut records = Vec::new();
    for (row_index, row) in reader.records().enumerate() {
        let row = row?;
        let key = row
            .get(key_index)
            .ok_or_else(|| anyhow!("Row {} has no value for key column", row_index + 1))?;
        let attributes = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(index, _)| *index != key_index)
            .map(|(_, (header, value))| (header.to_string(), value.to_string()))
            .collect();
        records.push(AttributeRecord {
            key: key.to_string(),
            attributes,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{read_records, AttributeRecord};

    #[rstest]
    fn test_read_records() {
        let contents = "name,2000,2009\nBeijing,2478.8,12153\nTianjin,1701.9,7521.9\n";
        let records = read_records(contents.as_bytes(), "name").unwrap();
        assert_eq!(
            records,
            vec![
                AttributeRecord::new("Beijing", &[("2000", "2478.8"), ("2009", "12153")]),
                AttributeRecord::new("Tianjin", &[("2000", "1701.9"), ("2009", "7521.9")]),
            ]
        );
    }

    #[rstest]
    fn test_read_records_key_column_not_first() {
        let contents = "gdp,region\n10,A\n";
        let records = read_records(contents.as_bytes(), "region").unwrap();
        assert_eq!(records, vec![AttributeRecord::new("A", &[("gdp", "10")])]);
    }

    #[rstest]
    fn test_read_records_missing_key_column() {
        let contents = "province,2009\nA,1\n";
        assert!(read_records(contents.as_bytes(), "name").is_err());
    }
}
