use rusqlite::{
    Connection, ErrorCode, TransactionBehavior, ffi,
    types::{Value, ValueRef},
};

use libris_core::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, ConstraintManifest, EntityDescriptor,
    FieldValue, RawError, Record, sqlstate,
};

use crate::error::StorageError;
use crate::schema::INTERNAL_TABLES;
use crate::traits::{Storage, TableColumn, UniqueIndex};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(n) | FieldValue::Timestamp(n) => Value::Integer(*n),
        FieldValue::Float(x) => Value::Real(*x),
        FieldValue::Boolean(b) => Value::Integer(i64::from(*b)),
    }
}

fn from_sql(value: ValueRef<'_>, column: &TableColumn) -> Result<FieldValue, StorageError> {
    let decl = column.decl_type.to_ascii_uppercase();
    Ok(match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(n) if decl == "TIMESTAMP" => FieldValue::Timestamp(n),
        ValueRef::Integer(n) if decl == "BOOLEAN" => FieldValue::Boolean(n != 0),
        ValueRef::Integer(n) => FieldValue::Integer(n),
        ValueRef::Real(x) => FieldValue::Float(x),
        ValueRef::Text(bytes) => FieldValue::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| StorageError::Serialization(format!("{}: {e}", column.name)))?
                .to_string(),
        ),
        ValueRef::Blob(_) => {
            return Err(StorageError::Serialization(format!(
                "{}: blob values are not supported",
                column.name
            )));
        }
    })
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<TableColumn>, StorageError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(TableColumn {
                name: row.get(1)?,
                decl_type: row.get(2)?,
                has_default: row.get::<_, Option<String>>(4)?.is_some(),
                pk: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Unique indexes on `table` with the constraint names callers see:
/// `<table>_pkey` for the primary key, `<table>_<cols>_key` for inline
/// UNIQUE clauses, and the index name for `CREATE UNIQUE INDEX`.
/// Expression indexes are skipped since they cannot be mapped to columns.
fn table_unique_indexes(conn: &Connection, table: &str) -> Result<Vec<UniqueIndex>, StorageError> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quote(table)))?;
    let listed = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let unique: bool = row.get(2)?;
            let origin: String = row.get(3)?;
            Ok((name, unique, origin))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut result = Vec::new();
    for (index, unique, origin) in listed {
        if !unique {
            continue;
        }
        let mut info = conn.prepare(&format!("PRAGMA index_info({})", quote(&index)))?;
        let columns = info
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<Result<Vec<_>, _>>()?;
        let Some(columns) = columns.into_iter().collect::<Option<Vec<String>>>() else {
            continue;
        };
        let constraint = match origin.as_str() {
            "pk" => format!("{table}_pkey"),
            "u" => format!("{table}_{}_key", columns.join("_")),
            _ => index,
        };
        result.push(UniqueIndex {
            constraint,
            primary_key: origin == "pk",
            columns,
        });
    }
    result.sort_by(|a, b| a.constraint.cmp(&b.constraint));
    Ok(result)
}

/// Store-assigned columns: an `INTEGER PRIMARY KEY` (rowid alias) and
/// timestamp columns with a default. `insert` rejects values for them, so
/// introspection can leave constraints over them out of the registry.
fn is_generated(column: &TableColumn, columns: &[TableColumn]) -> bool {
    let single_pk = columns.iter().filter(|c| c.pk > 0).count() == 1;
    let decl = column.decl_type.to_ascii_uppercase();
    (column.pk > 0 && single_pk && decl == "INTEGER")
        || (column.has_default && decl == "TIMESTAMP")
}

/// Splits `UNIQUE constraint failed: users.username, users.email` into the
/// table and its column list.
fn failed_columns(message: &str) -> Option<(String, Vec<String>)> {
    let (_, list) = message.split_once(": ")?;
    let mut table = None;
    let mut columns = Vec::new();
    for qualified in list.split(", ") {
        let (t, c) = qualified.trim().split_once('.')?;
        if table.is_none() {
            table = Some(t.to_string());
        }
        columns.push(c.to_string());
    }
    Some((table?, columns))
}

/// Postgres-style detail: `Key (isbn)=(123) already exists.`
fn duplicate_key_detail(columns: &[String], values: &Record) -> Option<String> {
    let rendered = columns
        .iter()
        .map(|c| values.get(c).map(|v| v.to_string()))
        .collect::<Option<Vec<_>>>()?;
    Some(format!(
        "Key ({})=({}) already exists.",
        columns.join(", "),
        rendered.join(", ")
    ))
}

/// Maps a failed insert onto the store error callers classify. Constraint
/// failures become [`StorageError::Database`] with a SQLSTATE code; anything
/// else stays a driver error.
fn translate(
    conn: &Connection,
    err: rusqlite::Error,
    entity: &str,
    values: &Record,
) -> StorageError {
    let (extended_code, message) = match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            (e.extended_code, msg.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => return StorageError::Sqlite(err),
    };

    match extended_code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
            let mut raw = RawError::new(sqlstate::UNIQUE_VIOLATION, message.clone());
            if let Some((table, columns)) = failed_columns(&message) {
                let constraint = table_unique_indexes(conn, &table)
                    .ok()
                    .and_then(|indexes| indexes.into_iter().find(|i| i.columns == columns))
                    .map(|i| i.constraint);
                if let Some(constraint) = constraint {
                    raw = raw.with_constraint(constraint);
                }
                if table == entity
                    && let Some(detail) = duplicate_key_detail(&columns, values)
                {
                    raw = raw.with_detail(detail);
                }
                raw = raw.with_table(table);
            }
            StorageError::Database(raw)
        }
        ffi::SQLITE_CONSTRAINT_CHECK => {
            let mut raw = RawError::new(sqlstate::CHECK_VIOLATION, message.clone()).with_table(entity);
            if let Some((_, name)) = message.split_once(": ") {
                raw = raw.with_constraint(name.trim());
            }
            StorageError::Database(raw)
        }
        ffi::SQLITE_CONSTRAINT_NOTNULL => {
            let mut raw = RawError::new(sqlstate::NOT_NULL_VIOLATION, message.clone());
            if let Some((table, columns)) = failed_columns(&message) {
                raw = raw
                    .with_detail(format!("null value in column \"{}\"", columns.join(", ")))
                    .with_table(table);
            }
            StorageError::Database(raw)
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StorageError::Database(
            RawError::new(sqlstate::FOREIGN_KEY_VIOLATION, message).with_table(entity),
        ),
        _ => StorageError::Database(
            RawError::new(sqlstate::INTEGRITY_CONSTRAINT_VIOLATION, message).with_table(entity),
        ),
    }
}

fn read_record(row: &rusqlite::Row, columns: &[TableColumn]) -> Result<Record, StorageError> {
    let mut record = Record::new();
    for (i, column) in columns.iter().enumerate() {
        record.set(&column.name, from_sql(row.get_ref(i)?, column)?);
    }
    Ok(record)
}

impl Storage for SqliteStorage {
    fn insert(&mut self, entity: &str, values: &Record) -> Result<Record, StorageError> {
        let columns = self.columns(entity)?;
        for column in values.columns() {
            if !columns.iter().any(|c| c.name == column) {
                return Err(StorageError::UnknownColumn {
                    entity: entity.to_string(),
                    column: column.to_string(),
                });
            }
        }
        if let Some(column) = columns
            .iter()
            .find(|c| is_generated(c, &columns) && values.contains(&c.name))
        {
            return Err(StorageError::GeneratedColumn {
                entity: entity.to_string(),
                column: column.name.clone(),
            });
        }

        let returning = columns
            .iter()
            .map(|c| quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING {returning}", quote(entity))
        } else {
            let names = values.columns().map(quote).collect::<Vec<_>>().join(", ");
            let placeholders = (1..=values.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({names}) VALUES ({placeholders}) RETURNING {returning}",
                quote(entity)
            )
        };
        let params: Vec<Value> = values.iter().map(|(_, v)| to_sql(v)).collect();

        // Takes the write lock up front; concurrent writers wait on busy_timeout.
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            match rows.next() {
                Ok(Some(row)) => read_record(row, &columns),
                Ok(None) => Err(StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
                Err(e) => Err(translate(&tx, e, entity, values)),
            }
        };
        // Dropping `tx` on error rolls the statement back.
        let record = inserted?;

        if let Err(e) = tx.commit() {
            return Err(StorageError::Transaction(Box::new(translate(
                &self.conn, e, entity, values,
            ))));
        }
        Ok(record)
    }

    fn find_by(
        &self,
        entity: &str,
        column: &str,
        value: &FieldValue,
    ) -> Result<Option<Record>, StorageError> {
        let columns = self.columns(entity)?;
        if !columns.iter().any(|c| c.name == column) {
            return Err(StorageError::UnknownColumn {
                entity: entity.to_string(),
                column: column.to_string(),
            });
        }
        let select = columns
            .iter()
            .map(|c| quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {select} FROM {} WHERE {} = ?1",
            quote(entity),
            quote(column)
        ))?;
        let mut rows = stmt.query([to_sql(value)])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_record(row, &columns)?)),
            None => Ok(None),
        }
    }

    fn count(&self, entity: &str) -> Result<u64, StorageError> {
        self.columns(entity)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(entity)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn columns(&self, entity: &str) -> Result<Vec<TableColumn>, StorageError> {
        if INTERNAL_TABLES.contains(&entity) {
            return Err(StorageError::UnknownEntity(entity.to_string()));
        }
        let columns = table_columns(&self.conn, entity)?;
        if columns.is_empty() {
            return Err(StorageError::UnknownEntity(entity.to_string()));
        }
        Ok(columns)
    }

    fn unique_indexes(&self, entity: &str) -> Result<Vec<UniqueIndex>, StorageError> {
        self.columns(entity)?;
        table_unique_indexes(&self.conn, entity)
    }

    fn introspect(&self) -> Result<ConstraintManifest, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entities = Vec::new();
        let mut constraints = Vec::new();
        for table in tables {
            if INTERNAL_TABLES.contains(&table.as_str()) {
                continue;
            }
            let columns = table_columns(&self.conn, &table)?;
            let described: Vec<ColumnDescriptor> = columns
                .iter()
                .map(|c| ColumnDescriptor {
                    name: c.name.clone(),
                    generated: is_generated(c, &columns),
                })
                .collect();

            for index in table_unique_indexes(&self.conn, &table)? {
                let touches_generated = index.columns.iter().any(|name| {
                    described
                        .iter()
                        .any(|c| &c.name == name && c.generated)
                });
                if touches_generated {
                    continue;
                }
                constraints.push(ConstraintDescriptor {
                    name: index.constraint,
                    entity: table.clone(),
                    columns: index.columns,
                    kind: if index.primary_key {
                        ConstraintKind::PrimaryKey
                    } else {
                        ConstraintKind::Unique
                    },
                    identity: None,
                });
            }
            entities.push(EntityDescriptor::new(&table, described));
        }
        Ok(ConstraintManifest::new(entities, constraints))
    }
}
