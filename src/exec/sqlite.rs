//! SQLite executor.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::schema::Table;
use crate::sql::dialect::Dialect;
use crate::sql::types::DataType;

use super::{ExecResult, Executor, Row, Value};

/// Executor over a `rusqlite` connection.
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn open(config: &ConnectionConfig) -> ExecResult<Self> {
        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        Ok(Self { conn })
    }

    pub fn in_memory() -> ExecResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Describe `table` from `PRAGMA table_info` and `foreign_key_list`.
    ///
    /// Columns with a declared type that does not parse are described as
    /// text, the way SQLite treats them.
    pub fn reflect_table(&self, table: &str) -> ExecResult<Table> {
        let mut reflected = Table::new(table);
        let mut pk: Vec<(i64, String)> = Vec::new();

        let mut stmt = self.conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (name, declared, pk_position) in columns {
            let data_type = DataType::parse(&declared).unwrap_or(DataType::Text);
            if pk_position > 0 {
                pk.push((pk_position, name.clone()));
            }
            reflected = reflected.column(name, data_type);
        }
        if !pk.is_empty() {
            pk.sort();
            reflected = reflected.primary_key(pk.into_iter().map(|(_, name)| name));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1)")?;
        let foreign_keys = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (column, references, to) in foreign_keys {
            // a missing target column means the referenced primary key
            let to = to.unwrap_or_else(|| column.clone());
            reflected = reflected.foreign_key(column, references, to);
        }

        debug!(
            table,
            columns = reflected.columns.len(),
            foreign_keys = reflected.foreign_keys.len(),
            "reflected table"
        );
        Ok(reflected)
    }

    /// Names of every user table.
    pub fn table_names(&self) -> ExecResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn fetch(&self, sql: &str) -> ExecResult<Vec<Row>> {
        debug!(sql, "fetch");
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(to_value(row.get_ref(i)?));
            }
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    fn execute_batch(&self, sql: &str) -> ExecResult<()> {
        debug!(sql, "execute batch");
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}
