//! Purpose: Convert between delimited metafield values and row/column grids.
//! Exports: `GridField`, `ROW_DELIMITER`, `COL_DELIMITER`, `order_by_index`.
//! Role: Pure codec shared by the export and import paths.
//! Invariants: `decode` and `encode` are total; `encode(decode(s)) == s` for every string.
//! Invariants: Delimiters inside cell text are not escaped; such cells split on decode.
//! Invariants: Interchange keys are decimal 0-based indices, ordered numerically.
use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};

pub const ROW_DELIMITER: &str = "<!--|row|-->";
pub const COL_DELIMITER: &str = "<!--|col|-->";

/// One power-editor metafield as a grid of rows and columns.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridField {
    pub id: Option<u64>,
    pub key: String,
    #[serde(rename = "data", default, with = "indexed_rows")]
    pub rows: Vec<Vec<String>>,
}

impl GridField {
    pub fn new(key: impl Into<String>, id: Option<u64>, rows: Vec<Vec<String>>) -> Self {
        Self {
            id,
            key: key.into(),
            rows,
        }
    }

    /// Splits a stored value into rows, then each row into cells.
    ///
    /// An empty value yields one row holding one empty cell.
    pub fn decode(key: impl Into<String>, id: Option<u64>, value: &str) -> Self {
        let rows = value
            .split(ROW_DELIMITER)
            .map(|row| row.split(COL_DELIMITER).map(str::to_string).collect())
            .collect();
        Self::new(key, id, rows)
    }

    pub fn encode(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join(COL_DELIMITER))
            .collect::<Vec<_>>()
            .join(ROW_DELIMITER)
    }
}

/// Orders values by their decimal index keys, comparing the parsed integers.
pub fn order_by_index<T>(
    entries: impl IntoIterator<Item = (String, T)>,
) -> Result<Vec<T>, Error> {
    let mut indexed = entries
        .into_iter()
        .map(|(key, value)| {
            key.parse::<usize>()
                .map(|index| (index, value))
                .map_err(|err| {
                    Error::new(ErrorKind::Corrupt)
                        .with_message(format!("grid index '{key}' is not a decimal integer"))
                        .with_source(err)
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    if let Some(pair) = indexed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("grid index {} appears more than once", pair[0].0)));
    }
    Ok(indexed.into_iter().map(|(_, value)| value).collect())
}

mod indexed_rows {
    use super::order_by_index;
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    struct IndexedCells<'a>(&'a [String]);

    impl Serialize for IndexedCells<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (index, cell) in self.0.iter().enumerate() {
                map.serialize_entry(&index.to_string(), cell)?;
            }
            map.end()
        }
    }

    pub fn serialize<S: Serializer>(
        rows: &[Vec<String>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(rows.len()))?;
        for (index, row) in rows.iter().enumerate() {
            map.serialize_entry(&index.to_string(), &IndexedCells(row))?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<String>>, D::Error> {
        let raw = HashMap::<String, HashMap<String, String>>::deserialize(deserializer)?;
        order_by_index(raw)
            .map_err(D::Error::custom)?
            .into_iter()
            .map(|cells| order_by_index(cells).map_err(D::Error::custom))
            .collect()
    }
}
