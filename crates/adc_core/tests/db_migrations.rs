use adc_core::db::migrations::latest_version;
use adc_core::db::{open_db, open_db_in_memory, open_db_with, schema_version, DbError};
use adc_core::{DatabaseConfig, RepoError, Repository, Role, SqliteRepository};
use rusqlite::Connection;

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn fresh_memory_database_has_every_entity_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    let tables = table_names(&conn);
    for expected in [
        "conversions",
        "file_system_entries",
        "roles",
        "user_roles",
        "users",
    ] {
        assert!(tables.iter().any(|name| name == expected), "missing {expected}");
    }
}

#[test]
fn dangling_role_link_is_rejected_by_foreign_keys() {
    let conn = open_db_in_memory().unwrap();

    let err = conn
        .execute("INSERT INTO user_roles (user_id, role_id) VALUES (42, 42);", [])
        .unwrap_err();

    assert!(DbError::from(err).is_constraint_violation());
}

#[test]
fn reopening_file_keeps_rows_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("adc.db");

    {
        let conn = open_db(&path).unwrap();
        let mut roles = SqliteRepository::<Role>::try_new(&conn).unwrap();
        roles.create(Role::new("Admin")).unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    let roles = SqliteRepository::<Role>::try_new(&conn).unwrap();
    assert_eq!(roles.get_list(&Default::default()).unwrap().len(), 1);
}

#[test]
fn config_without_path_opens_memory_database() {
    let conn = open_db_with(&DatabaseConfig::default()).unwrap();

    assert!(SqliteRepository::<Role>::try_new(&conn).is_ok());
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("PRAGMA user_version = 999;")
        .unwrap();

    match open_db(&path).unwrap_err() {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_role_name_surfaces_as_constraint_violation() {
    let conn = open_db_in_memory().unwrap();
    let mut roles = SqliteRepository::<Role>::try_new(&conn).unwrap();
    roles.create(Role::new("Admin")).unwrap();

    match roles.create(Role::new("ADMIN")).unwrap_err() {
        RepoError::Db(err) => assert!(err.is_constraint_violation()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteRepository::<Role>::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn repository_rejects_missing_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE user_roles; DROP TABLE roles;")
        .unwrap();

    let err = SqliteRepository::<Role>::try_new(&conn).err().unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable("roles")));
}
