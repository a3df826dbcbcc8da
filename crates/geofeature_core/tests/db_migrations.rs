use geofeature_core::db::migrations::latest_version;
use geofeature_core::db::{open_db, open_db_in_memory, DbError};
use geofeature_core::{RepoError, SqliteFeatureRepository};
use rusqlite::Connection;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "project_features");
    assert_index_exists(&conn, "idx_project_features_project_id_id");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "project_features");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteFeatureRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn schema_rejects_overlong_tags_and_non_positive_projects() {
    let conn = open_db_in_memory().unwrap();

    let long_tag = conn.execute(
        "INSERT INTO project_features (project_id, geometry, geometry_type, type)
         VALUES (1, 'POINT (0 0)', 'Point', ?1);",
        ["x".repeat(51)],
    );
    assert!(long_tag.is_err());

    let bad_project = conn.execute(
        "INSERT INTO project_features (project_id, geometry, geometry_type, type)
         VALUES (0, 'POINT (0 0)', 'Point', 'point');",
        [],
    );
    assert!(bad_project.is_err());
}

#[test]
fn single_migration_creates_ordered_project_index() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(latest_version(), 1);
    let indexes: Vec<String> = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'project_features' AND sql IS NOT NULL
             ORDER BY name;",
        )
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(indexes, vec!["idx_project_features_project_id_id".to_string()]);
}

#[test]
fn default_timestamps_have_millisecond_resolution() {
    let conn = open_db_in_memory().unwrap();
    let before_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;

    let mut stamps = Vec::new();
    for _ in 0..20 {
        let created_at: i64 = conn
            .query_row(
                "INSERT INTO project_features (project_id, geometry, geometry_type, type)
                 VALUES (1, 'SRID=4326;POINT(0 0)', 'Point', 'point')
                 RETURNING created_at;",
                [],
                |row| row.get(0),
            )
            .unwrap();
        stamps.push(created_at);
        std::thread::sleep(Duration::from_millis(3));
    }

    assert!(stamps.iter().any(|stamp| stamp % 1000 != 0));
    assert!(stamps.iter().all(|stamp| (stamp - before_ms).abs() < 60_000));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
