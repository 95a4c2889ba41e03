// Embedded analytical destination backed by SQLite

pub mod schema;

use crate::constants::PRIMARY_KEY;
use crate::error::{PipelineError, Result};
use crate::pipeline::timestamps::current_timestamp;
use crate::pipeline::Loader;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use schema::{flatten_record, infer_columns, normalize_identifier, ColumnType, FlatRow};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Ledger of every load written to the destination
pub const LOADS_TABLE: &str = "_loads";
/// Column stamped on each row with the load that last wrote it
pub const LOAD_ID_COLUMN: &str = "_load_id";

/// Where a destination lives: `<pipelines_dir>/<pipeline_name>/<dataset_name>.db`
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationConfig {
    pub pipelines_dir: PathBuf,
    pub pipeline_name: String,
    pub dataset_name: String,
}

impl DestinationConfig {
    /// Pipeline `<source>_pipeline` writing dataset `<source>`.
    pub fn for_source(pipelines_dir: impl Into<PathBuf>, source_name: &str) -> Self {
        Self {
            pipelines_dir: pipelines_dir.into(),
            pipeline_name: format!("{source_name}_pipeline"),
            dataset_name: source_name.to_string(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.pipelines_dir
            .join(&self.pipeline_name)
            .join(format!("{}.db", self.dataset_name))
    }
}

/// Result of one merge write
#[derive(Debug, Clone, PartialEq)]
pub struct LoadInfo {
    pub load_id: String,
    pub table_name: String,
    pub rows_loaded: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Row of the `_loads` ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub load_id: String,
    pub pipeline_name: String,
    pub dataset_name: String,
    pub table_name: String,
    pub row_count: usize,
    pub inserted: usize,
    pub updated: usize,
    pub loaded_at: String,
}

pub struct Destination {
    conn: Connection,
    pipeline_name: String,
    dataset_name: String,
}

impl Destination {
    pub fn open(config: &DestinationConfig) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!("Opened destination at {}", db_path.display());
        Self::init(conn, &config.pipeline_name, &config.dataset_name)
    }

    /// Non-persistent destination, used by tests and dry runs.
    pub fn in_memory(pipeline_name: &str, dataset_name: &str) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, pipeline_name, dataset_name)
    }

    fn init(conn: Connection, pipeline_name: &str, dataset_name: &str) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS _loads (
                load_id        TEXT PRIMARY KEY,
                pipeline_name  TEXT NOT NULL,
                dataset_name   TEXT NOT NULL,
                table_name     TEXT NOT NULL,
                row_count      INTEGER NOT NULL,
                inserted       INTEGER NOT NULL,
                updated        INTEGER NOT NULL,
                loaded_at      TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn,
            pipeline_name: pipeline_name.to_string(),
            dataset_name: dataset_name.to_string(),
        })
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Insert-or-update `records` into `table_name`, keyed by `id`.
    ///
    /// Nested fields become `parent__child` columns; the table is created or
    /// widened to fit the batch. Columns that already exist keep their
    /// declared type and incoming values are coerced to it. The batch is
    /// written in one transaction and either lands completely or not at all.
    pub fn upsert<R: Serialize>(&mut self, records: &[R], table_name: &str) -> Result<LoadInfo> {
        let table = normalize_identifier(table_name);
        if table == LOADS_TABLE {
            return Err(PipelineError::InvalidRecord {
                table,
                message: "table name is reserved".to_string(),
            });
        }

        let load_id = Uuid::new_v4().to_string();
        let rows = prepare_rows(records, &table, &load_id)?;
        if rows.is_empty() {
            info!(table = %table, "No records to load");
            return Ok(LoadInfo {
                load_id,
                table_name: table,
                rows_loaded: 0,
                inserted: 0,
                updated: 0,
            });
        }

        let batch_columns = infer_columns(&rows);
        let tx = self.conn.transaction()?;
        let columns = sync_table_schema(&tx, &table, &batch_columns)?;

        let (inserted, updated) = write_rows(&tx, &table, &columns, &rows)?;

        tx.execute(
            "INSERT INTO _loads (load_id, pipeline_name, dataset_name, table_name, row_count, inserted, updated, loaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                load_id,
                self.pipeline_name,
                self.dataset_name,
                table,
                rows.len() as i64,
                inserted as i64,
                updated as i64,
                current_timestamp()
            ],
        )?;
        tx.commit()?;

        info!(
            table = %table,
            load_id = %load_id,
            "Loaded {} rows ({} inserted, {} updated)",
            rows.len(),
            inserted,
            updated
        );

        Ok(LoadInfo {
            load_id,
            table_name: table,
            rows_loaded: rows.len(),
            inserted,
            updated,
        })
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists(&self.conn, &normalize_identifier(table_name))
    }

    /// Column names and declared types, in table order.
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<(String, String)>> {
        table_columns(&self.conn, &normalize_identifier(table_name))
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        let table = normalize_identifier(table_name);
        if !table_exists(&self.conn, &table)? {
            return Ok(0);
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Flat column map for the row with the given `id`; booleans and JSON
    /// columns are decoded from their declared types.
    pub fn fetch_row(&self, table_name: &str, id: &str) -> Result<Option<Map<String, Value>>> {
        let table = normalize_identifier(table_name);
        let columns = table_columns(&self.conn, &table)?;
        if columns.is_empty() {
            return Ok(None);
        }

        let select_list = columns
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            select_list,
            quote_ident(&table),
            quote_ident(PRIMARY_KEY)
        );

        let row = self
            .conn
            .query_row(&sql, params![id], |row| {
                let mut map = Map::new();
                for (i, (name, declared)) in columns.iter().enumerate() {
                    let value = from_sql_value(row.get_ref(i)?, ColumnType::from_sql(declared));
                    map.insert(name.clone(), value);
                }
                Ok(map)
            })
            .optional()?;
        Ok(row)
    }

    /// Load ledger, oldest first.
    pub fn loads(&self) -> Result<Vec<LoadRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT load_id, pipeline_name, dataset_name, table_name, row_count, inserted, updated, loaded_at
             FROM _loads ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LoadRecord {
                load_id: row.get(0)?,
                pipeline_name: row.get(1)?,
                dataset_name: row.get(2)?,
                table_name: row.get(3)?,
                row_count: row.get::<_, i64>(4)? as usize,
                inserted: row.get::<_, i64>(5)? as usize,
                updated: row.get::<_, i64>(6)? as usize,
                loaded_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl Loader for Destination {
    fn load<R: Serialize>(&mut self, records: &[R], table_name: &str) -> Result<LoadInfo> {
        self.upsert(records, table_name)
    }
}

fn prepare_rows<R: Serialize>(records: &[R], table: &str, load_id: &str) -> Result<Vec<FlatRow>> {
    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let Value::Object(map) = serde_json::to_value(record)? else {
            return Err(PipelineError::InvalidRecord {
                table: table.to_string(),
                message: format!("record {index} is not an object"),
            });
        };
        let mut row = flatten_record(&map).map_err(|collision| PipelineError::InvalidRecord {
            table: table.to_string(),
            message: format!(
                "record {index} has several fields mapping to column '{}'",
                collision.column
            ),
        })?;
        match row.get(PRIMARY_KEY) {
            Some(Value::String(id)) if !id.is_empty() => {}
            _ => {
                return Err(PipelineError::MissingPrimaryKey {
                    table: table.to_string(),
                    index,
                })
            }
        }
        if row
            .insert(LOAD_ID_COLUMN.to_string(), Value::String(load_id.to_string()))
            .is_some()
        {
            return Err(PipelineError::InvalidRecord {
                table: table.to_string(),
                message: format!("record {index} uses reserved column '{LOAD_ID_COLUMN}'"),
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Create the table, or add columns the batch introduces. Returns the type
/// each batch column is written as: existing columns keep their declared
/// type.
fn sync_table_schema(
    tx: &Transaction<'_>,
    table: &str,
    columns: &BTreeMap<String, ColumnType>,
) -> Result<BTreeMap<String, ColumnType>> {
    let existing = table_columns(tx, table)?;

    if existing.is_empty() {
        let mut defs = vec![format!("{} TEXT NOT NULL PRIMARY KEY", quote_ident(PRIMARY_KEY))];
        defs.extend(
            columns
                .iter()
                .filter(|(name, _)| name.as_str() != PRIMARY_KEY)
                .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_type())),
        );
        tx.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_ident(table),
            defs.join(", ")
        ))?;
        debug!(table = %table, "Created table with {} columns", defs.len());
        return Ok(columns.clone());
    }

    let mut effective = BTreeMap::new();
    for (name, ty) in columns {
        if let Some((_, declared)) = existing.iter().find(|(col, _)| col == name) {
            let declared_type = ColumnType::from_sql(declared).unwrap_or(*ty);
            if declared_type != *ty {
                warn!(
                    table = %table,
                    column = %name,
                    declared = declared_type.sql_type(),
                    incoming = ty.sql_type(),
                    "Column type differs from batch; coercing values to the declared type"
                );
            }
            effective.insert(name.clone(), declared_type);
            continue;
        }
        tx.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} {};",
            quote_ident(table),
            quote_ident(name),
            ty.sql_type()
        ))?;
        info!(table = %table, column = %name, "Added column");
        effective.insert(name.clone(), *ty);
    }
    Ok(effective)
}

fn write_rows(
    tx: &Transaction<'_>,
    table: &str,
    columns: &BTreeMap<String, ColumnType>,
    rows: &[FlatRow],
) -> Result<(usize, usize)> {
    let names: Vec<&String> = columns.keys().collect();
    let column_list = names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=names.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = names
        .iter()
        .filter(|n| n.as_str() != PRIMARY_KEY)
        .map(|n| format!("{0} = excluded.{0}", quote_ident(n)))
        .collect::<Vec<_>>()
        .join(", ");

    let upsert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        quote_ident(table),
        column_list,
        placeholders,
        quote_ident(PRIMARY_KEY),
        updates
    );
    let exists_sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1",
        quote_ident(table),
        quote_ident(PRIMARY_KEY)
    );

    let mut upsert_stmt = tx.prepare(&upsert_sql)?;
    let mut exists_stmt = tx.prepare(&exists_sql)?;
    let mut inserted = 0;
    let mut updated = 0;

    for row in rows {
        let id = row.get(PRIMARY_KEY).and_then(Value::as_str).unwrap_or_default();
        if exists_stmt.exists(params![id])? {
            updated += 1;
        } else {
            inserted += 1;
        }

        let values = names
            .iter()
            .map(|name| to_sql_value(row.get(*name), columns[*name]));
        upsert_stmt.execute(params_from_iter(values))?;
    }

    Ok((inserted, updated))
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
    Ok(columns)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Value as written into a column of `column_type`. Values with no faithful
/// representation in that type are stored unchanged.
fn to_sql_value(value: Option<&Value>, column_type: ColumnType) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => match column_type {
            ColumnType::Text | ColumnType::Json => SqlValue::Text(b.to_string()),
            _ => SqlValue::Integer(i64::from(*b)),
        },
        Some(Value::Number(n)) => number_to_sql(n, column_type),
        Some(Value::String(s)) => string_to_sql(s, column_type),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn number_to_sql(n: &serde_json::Number, column_type: ColumnType) -> SqlValue {
    match column_type {
        ColumnType::BigInt | ColumnType::Bool => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                SqlValue::Integer(f as i64)
            }
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Null,
        },
        ColumnType::Double => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        ColumnType::Text | ColumnType::Json => SqlValue::Text(n.to_string()),
    }
}

fn string_to_sql(s: &str, column_type: ColumnType) -> SqlValue {
    let coerced = match column_type {
        ColumnType::Bool => s.parse::<bool>().ok().map(|b| SqlValue::Integer(i64::from(b))),
        ColumnType::BigInt => s.parse::<i64>().ok().map(SqlValue::Integer),
        ColumnType::Double => s
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(SqlValue::Real),
        ColumnType::Text | ColumnType::Json => None,
    };
    coerced.unwrap_or_else(|| SqlValue::Text(s.to_string()))
}

fn from_sql_value(value: ValueRef<'_>, column_type: Option<ColumnType>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if column_type == Some(ColumnType::Bool) => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if column_type == Some(ColumnType::Json) {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            }
        }
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
