use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Bookkeeping tables that are not entities.
pub const INTERNAL_TABLES: &[&str] = &["schema_version"];

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

// Primary keys are reported as `<table>_pkey`; named unique constraints are
// unique indexes so the catalogue keeps their names.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL CONSTRAINT authors_name_check CHECK (length(name) > 0),
    created_at TIMESTAMP NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    updated_at TIMESTAMP NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
CREATE UNIQUE INDEX IF NOT EXISTS unique_author_name ON authors (name);

CREATE TABLE IF NOT EXISTS books (
    isbn TEXT NOT NULL PRIMARY KEY CONSTRAINT books_isbn_check CHECK (length(isbn) > 0),
    title TEXT NOT NULL CONSTRAINT books_title_check CHECK (length(title) > 0),
    created_at TIMESTAMP NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    updated_at TIMESTAMP NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS book_authors (
    book_isbn TEXT NOT NULL REFERENCES books (isbn),
    author_id INTEGER NOT NULL REFERENCES authors (id),
    PRIMARY KEY (book_isbn, author_id)
);
CREATE INDEX IF NOT EXISTS idx_book_authors_author ON book_authors (author_id);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL CONSTRAINT users_username_check CHECK (length(username) > 0),
    email TEXT NOT NULL CONSTRAINT users_email_check CHECK (length(email) > 0),
    bio TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    updated_at TIMESTAMP NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
CREATE UNIQUE INDEX IF NOT EXISTS unique_user_username ON users (username);
CREATE UNIQUE INDEX IF NOT EXISTS unique_user_email ON users (email);
";
