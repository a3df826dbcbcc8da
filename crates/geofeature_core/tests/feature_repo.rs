use geofeature_core::db::open_db_in_memory;
use geofeature_core::{
    parse_geometry, FeatureRepository, GeometryCodec, GeometryKind, NewFeature, PropertyMap,
    PropertyValue, RepoError, SqliteFeatureRepository, WktCodec,
};
use serde_json::json;

fn new_point(source_index: usize, x: f64, tag: &str) -> NewFeature {
    let geometry = parse_geometry(&json!({"type": "Point", "coordinates": [x, 0.0]})).unwrap();
    let mut properties = PropertyMap::new();
    properties.insert("label".to_string(), PropertyValue::from(format!("p{source_index}")));
    properties.insert("rank".to_string(), PropertyValue::from(2_i64));
    NewFeature {
        source_index,
        geometry: WktCodec.to_storage_form(&geometry).unwrap(),
        geometry_kind: GeometryKind::Point,
        tag: tag.to_string(),
        properties,
    }
}

#[test]
fn insert_and_list_roundtrip_in_natural_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFeatureRepository::try_new(&conn).unwrap();

    let inserted = repo
        .insert_features(1, &[new_point(0, 1.0, "tree"), new_point(1, 2.0, "bench")])
        .unwrap();
    assert_eq!(inserted.len(), 2);
    assert!(inserted[0].id < inserted[1].id);
    assert!(inserted[0].created_at > 0);

    let listed = repo.list_features(1).unwrap();
    assert_eq!(listed, inserted);
    assert_eq!(listed[0].tag, "tree");
    assert!(listed[1].geometry.as_str().starts_with("SRID=4326;POINT"));
    assert_eq!(
        listed[1].properties.get("label"),
        Some(&PropertyValue::from("p1"))
    );
}

#[test]
fn properties_keep_integer_numbers_in_storage() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFeatureRepository::try_new(&conn).unwrap();
    let stored = repo.insert_features(1, &[new_point(0, 0.0, "tree")]).unwrap();

    let raw: String = conn
        .query_row(
            "SELECT properties FROM project_features WHERE id = ?1;",
            [stored[0].id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(raw, r#"{"label":"p0","rank":2}"#);
}

#[test]
fn list_and_count_are_scoped_to_project() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFeatureRepository::try_new(&conn).unwrap();
    repo.insert_features(1, &[new_point(0, 0.0, "a")]).unwrap();
    repo.insert_features(2, &[new_point(0, 0.0, "b"), new_point(1, 1.0, "c")])
        .unwrap();

    assert_eq!(repo.count_features(1).unwrap(), 1);
    assert_eq!(repo.count_features(2).unwrap(), 2);
    assert_eq!(repo.count_features(3).unwrap(), 0);
    assert!(repo.list_features(3).unwrap().is_empty());
}

#[test]
fn delete_removes_rows_and_reports_missing_ids() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteFeatureRepository::try_new(&conn).unwrap();
    let stored = repo
        .insert_features(1, &[new_point(0, 0.0, "a"), new_point(1, 1.0, "b")])
        .unwrap();

    assert_eq!(repo.delete_features(&[]).unwrap(), 0);
    assert_eq!(repo.delete_features(&[stored[0].id]).unwrap(), 1);
    assert_eq!(repo.count_features(1).unwrap(), 1);

    let err = repo.delete_features(&[stored[0].id]).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == stored[0].id));
}

#[test]
fn list_rejects_corrupted_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO project_features (project_id, geometry, geometry_type, type, properties)
         VALUES (1, 'SRID=4326;POINT (0 0)', 'Circle', 'point', '{}');",
        [],
    )
    .unwrap();
    let repo = SqliteFeatureRepository::try_new(&conn).unwrap();

    let err = repo.list_features(1).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
