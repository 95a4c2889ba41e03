use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Joins parent and child keys of nested objects into one column name
pub const NESTING_SEPARATOR: &str = "__";

/// A record flattened to column name → scalar value
pub type FlatRow = BTreeMap<String, Value>;

/// Column types the destination knows how to declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    BigInt,
    Double,
    Text,
    /// Arrays, stored as JSON text
    Json,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Bool => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Text => "TEXT",
            ColumnType::Json => "JSON",
        }
    }

    pub fn from_sql(declared: &str) -> Option<Self> {
        match declared.to_ascii_uppercase().as_str() {
            "BOOLEAN" => Some(ColumnType::Bool),
            "BIGINT" => Some(ColumnType::BigInt),
            "DOUBLE" => Some(ColumnType::Double),
            "TEXT" => Some(ColumnType::Text),
            "JSON" => Some(ColumnType::Json),
            _ => None,
        }
    }

    /// Type of a single value; `None` for nulls, which carry no type.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(ColumnType::BigInt),
            Value::Number(_) => Some(ColumnType::Double),
            Value::String(_) => Some(ColumnType::Text),
            Value::Array(_) | Value::Object(_) => Some(ColumnType::Json),
        }
    }

    fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (ColumnType::BigInt, ColumnType::Double) | (ColumnType::Double, ColumnType::BigInt) => {
                ColumnType::Double
            }
            _ => self,
        }
    }
}

/// Lower snake_case identifier safe to use as a table or column name.
///
/// `customerStatus` → `customer_status`, `Signup Date` → `signup_date`,
/// `1st` → `_1st`.
pub fn normalize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;

    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower_or_digit {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            out.push('_');
            prev_lower_or_digit = false;
        }
    }

    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Two source keys in one record that map to the same column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCollision {
    pub column: String,
}

/// Flattens nested objects into `parent__child` columns. Arrays stay as values.
///
/// Fails when two keys normalize to the same column, e.g. `customerStatus`
/// and `customer_status`, or `a: {b: 1}` and `a__b`.
pub fn flatten_record(record: &Map<String, Value>) -> Result<FlatRow, ColumnCollision> {
    let mut row = FlatRow::new();
    flatten_into(&mut row, None, record)?;
    Ok(row)
}

fn flatten_into(
    row: &mut FlatRow,
    prefix: Option<&str>,
    map: &Map<String, Value>,
) -> Result<(), ColumnCollision> {
    for (key, value) in map {
        let key = normalize_identifier(key);
        let column = match prefix {
            Some(parent) => format!("{parent}{NESTING_SEPARATOR}{key}"),
            None => key,
        };
        match value {
            Value::Object(inner) => flatten_into(row, Some(&column), inner)?,
            other => {
                if row.contains_key(&column) {
                    return Err(ColumnCollision { column });
                }
                row.insert(column, other.clone());
            }
        }
    }
    Ok(())
}

/// Column types for a batch of rows. Columns that are null in every row are
/// left out.
pub fn infer_columns(rows: &[FlatRow]) -> BTreeMap<String, ColumnType> {
    let mut columns: BTreeMap<String, ColumnType> = BTreeMap::new();
    for row in rows {
        for (name, value) in row {
            let Some(found) = ColumnType::of(value) else {
                continue;
            };
            columns
                .entry(name.clone())
                .and_modify(|current| *current = current.widen(found))
                .or_insert(found);
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("customer_id"), "customer_id");
        assert_eq!(normalize_identifier("customerStatus"), "customer_status");
        assert_eq!(normalize_identifier("Signup Date"), "signup_date");
        assert_eq!(normalize_identifier("1st"), "_1st");
        assert_eq!(normalize_identifier("_load_id"), "_load_id");
        assert_eq!(normalize_identifier(""), "_");
    }

    #[test]
    fn test_flatten_nested_metadata() {
        let record = json!({
            "id": "cust_1",
            "metadata": {
                "source": "customer_master_csv",
                "data_quality": {"has_required_fields": true, "is_valid_email": false}
            },
            "tags": ["a", "b"]
        });

        let row = flatten_record(record.as_object().unwrap()).unwrap();

        assert_eq!(row["id"], json!("cust_1"));
        assert_eq!(row["metadata__source"], json!("customer_master_csv"));
        assert_eq!(row["metadata__data_quality__has_required_fields"], json!(true));
        assert_eq!(row["metadata__data_quality__is_valid_email"], json!(false));
        assert_eq!(row["tags"], json!(["a", "b"]));
        assert!(!row.contains_key("metadata"));
    }

    #[test]
    fn test_flatten_rejects_keys_that_share_a_column() {
        let camel_and_snake = json!({"id": "a", "customerStatus": "x", "customer_status": "y"});
        let err = flatten_record(camel_and_snake.as_object().unwrap()).unwrap_err();
        assert_eq!(err.column, "customer_status");

        let nested_and_joined = json!({"id": "a", "meta": {"source": "x"}, "meta__source": "y"});
        let err = flatten_record(nested_and_joined.as_object().unwrap()).unwrap_err();
        assert_eq!(err.column, "meta__source");
    }

    #[test]
    fn test_infer_columns_widens_and_skips_nulls() {
        let rows: Vec<FlatRow> = [
            json!({"id": "a", "amount": 10, "note": null, "flag": true}),
            json!({"id": "b", "amount": 10.5, "note": null, "flag": false}),
        ]
        .iter()
        .map(|v| flatten_record(v.as_object().unwrap()).unwrap())
        .collect();

        let columns = infer_columns(&rows);

        assert_eq!(columns["id"], ColumnType::Text);
        assert_eq!(columns["amount"], ColumnType::Double);
        assert_eq!(columns["flag"], ColumnType::Bool);
        assert!(!columns.contains_key("note"));
    }

    #[test]
    fn test_sql_type_round_trip() {
        for ty in [
            ColumnType::Bool,
            ColumnType::BigInt,
            ColumnType::Double,
            ColumnType::Text,
            ColumnType::Json,
        ] {
            assert_eq!(ColumnType::from_sql(ty.sql_type()), Some(ty));
        }
        assert_eq!(ColumnType::from_sql("blob"), None);
    }
}
