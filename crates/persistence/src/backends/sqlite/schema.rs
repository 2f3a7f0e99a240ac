//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Every table holding entity rows, referenced tables last.
pub const ENTITY_TABLES: [&str; 5] = [
    "phones",
    "employees",
    "students",
    "work_places",
    "nomenclatures",
];

fn migration_error(what: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("{what}: {e}"),
    })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error("failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("failed to clear schema_version", e))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| migration_error("failed to set schema_version", e))?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Relations are plain id columns without `REFERENCES` clauses: the
/// repositories maintain referential cleanup themselves so that a lenient
/// write can keep a dangling id.
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    let tables = [
        (
            "nomenclatures",
            "CREATE TABLE IF NOT EXISTS nomenclatures (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                kind TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                parent_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ),
        (
            "work_places",
            "CREATE TABLE IF NOT EXISTS work_places (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                email TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ),
        (
            "employees",
            "CREATE TABLE IF NOT EXISTS employees (
                id TEXT PRIMARY KEY,
                ci TEXT NOT NULL,
                name TEXT NOT NULL,
                last_name TEXT,
                email TEXT,
                address TEXT,
                gender TEXT,
                age INTEGER,
                active INTEGER NOT NULL DEFAULT 1,
                district_id TEXT,
                sub_district_id TEXT,
                registry_number TEXT,
                start_date TEXT,
                is_important INTEGER NOT NULL DEFAULT 0,
                category_id TEXT,
                scientific_degree_id TEXT,
                work_place_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ),
        (
            "students",
            "CREATE TABLE IF NOT EXISTS students (
                id TEXT PRIMARY KEY,
                ci TEXT NOT NULL,
                name TEXT NOT NULL,
                last_name TEXT,
                email TEXT,
                address TEXT,
                gender TEXT,
                age INTEGER,
                active INTEGER NOT NULL DEFAULT 1,
                district_id TEXT,
                sub_district_id TEXT,
                class_room TEXT,
                university_year INTEGER,
                residence TEXT,
                kind_id TEXT,
                specialty_id TEXT,
                study_center_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ),
        (
            "phones",
            "CREATE TABLE IF NOT EXISTS phones (
                id TEXT PRIMARY KEY,
                number INTEGER NOT NULL,
                description TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                employee_id TEXT,
                work_place_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ),
    ];

    for (name, sql) in tables {
        conn.execute(sql, [])
            .map_err(|e| migration_error(&format!("failed to create {name} table"), e))?;
    }

    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            _ => {
                return Err(StorageError::Backend(BackendError::MigrationError {
                    message: format!("unknown schema version: {version}"),
                }));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
        tracing::info!(version, "Migrated SQLite schema");
    }

    Ok(())
}

/// Migrate from schema version 1 to version 2.
///
/// Adds the unique identity-number indexes and the foreign-key lookup
/// indexes used by joins and cascades.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    let indexes = [
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_employees_ci ON employees(ci)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_students_ci ON students(ci)",
        "CREATE INDEX IF NOT EXISTS idx_employees_work_place ON employees(work_place_id)",
        "CREATE INDEX IF NOT EXISTS idx_phones_employee ON phones(employee_id)",
        "CREATE INDEX IF NOT EXISTS idx_phones_work_place ON phones(work_place_id)",
        "CREATE INDEX IF NOT EXISTS idx_nomenclatures_parent ON nomenclatures(parent_id, kind)",
        "CREATE INDEX IF NOT EXISTS idx_employees_order ON employees(last_name, name, id)",
        "CREATE INDEX IF NOT EXISTS idx_students_order ON students(last_name, name, id)",
    ];

    for index_sql in &indexes {
        conn.execute(index_sql, [])
            .map_err(|e| migration_error("failed to create index in migration", e))?;
    }

    Ok(())
}

/// Drops every table. Used by tests and the operator's reset command.
pub fn drop_all_tables(conn: &Connection) -> StorageResult<()> {
    for table in ENTITY_TABLES.iter().chain(["schema_version"].iter()) {
        conn.execute(&format!("DROP TABLE IF EXISTS {table}"), [])
            .map_err(|e| migration_error(&format!("failed to drop {table}"), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_schema_initialization() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = table_names(&conn);
        for table in ENTITY_TABLES {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migration_from_v1() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        create_schema_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();

        initialize_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_employees_ci'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);
    }

    #[test]
    fn test_drop_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        drop_all_tables(&conn).unwrap();
        assert!(table_names(&conn).is_empty());
    }
}
