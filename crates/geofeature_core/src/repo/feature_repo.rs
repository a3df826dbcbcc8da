//! Project feature repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - List, insert and delete `project_features` rows.
//! - Keep JSON/WKT column encoding inside the persistence boundary.
//!
//! # Invariants
//! - `list_features` returns rows in natural order (`id ASC`).
//! - The repository works on a plain connection or inside a caller-owned
//!   transaction; it never commits on its own.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::geometry::StoredGeometry;
use crate::model::feature::{
    FeatureId, GeometryKind, NewFeature, ProjectId, PropertyMap, StoredFeature,
};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const FEATURE_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    geometry,
    geometry_type,
    type,
    properties,
    created_at,
    updated_at
FROM project_features";

const REQUIRED_COLUMNS: [&str; 8] = [
    "id",
    "project_id",
    "geometry",
    "geometry_type",
    "type",
    "properties",
    "created_at",
    "updated_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for feature persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted or outgoing data cannot be encoded/decoded.
    InvalidData(String),
    /// A delete targeted a row that does not exist.
    NotFound(FeatureId),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "feature repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "feature repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "feature repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid feature data: {message}"),
            Self::NotFound(id) => write!(f, "feature {id} not found"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage collaborator used by the reconciler.
pub trait FeatureRepository {
    /// Lists one project's features in natural order.
    fn list_features(&self, project_id: ProjectId) -> RepoResult<Vec<StoredFeature>>;
    /// Persists new features for one project, returning the stored rows.
    fn insert_features(
        &self,
        project_id: ProjectId,
        features: &[NewFeature],
    ) -> RepoResult<Vec<StoredFeature>>;
    /// Deletes rows by id, returning how many rows were removed.
    fn delete_features(&self, ids: &[FeatureId]) -> RepoResult<usize>;
    /// Counts one project's features.
    fn count_features(&self, project_id: ProjectId) -> RepoResult<usize>;
}

/// SQLite-backed feature repository.
///
/// Accepts `&Transaction` through deref, which is how the feature service
/// scopes a reconciliation.
pub struct SqliteFeatureRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFeatureRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_feature_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl FeatureRepository for SqliteFeatureRepository<'_> {
    fn list_features(&self, project_id: ProjectId) -> RepoResult<Vec<StoredFeature>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FEATURE_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([project_id])?;
        let mut features = Vec::new();
        while let Some(row) = rows.next()? {
            features.push(parse_feature_row(row)?);
        }
        Ok(features)
    }

    fn insert_features(
        &self,
        project_id: ProjectId,
        features: &[NewFeature],
    ) -> RepoResult<Vec<StoredFeature>> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO project_features (
                project_id,
                geometry,
                geometry_type,
                type,
                properties
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, created_at, updated_at;",
        )?;

        let mut stored = Vec::with_capacity(features.len());
        for feature in features {
            let properties = serde_json::to_string(&feature.properties).map_err(|err| {
                RepoError::InvalidData(format!(
                    "cannot encode properties of feature {}: {err}",
                    feature.source_index
                ))
            })?;
            let (id, created_at, updated_at): (FeatureId, i64, i64) = stmt.query_row(
                params![
                    project_id,
                    feature.geometry.as_str(),
                    feature.geometry_kind.as_str(),
                    feature.tag.as_str(),
                    properties,
                ],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            stored.push(StoredFeature {
                id,
                project_id,
                geometry: feature.geometry.clone(),
                geometry_kind: feature.geometry_kind,
                tag: feature.tag.clone(),
                properties: feature.properties.clone(),
                created_at,
                updated_at,
            });
        }
        Ok(stored)
    }

    fn delete_features(&self, ids: &[FeatureId]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut stmt = self
            .conn
            .prepare("DELETE FROM project_features WHERE id = ?1;")?;
        let mut deleted = 0;
        for id in ids {
            match stmt.execute([id])? {
                0 => return Err(RepoError::NotFound(*id)),
                changed => deleted += changed,
            }
        }
        Ok(deleted)
    }

    fn count_features(&self, project_id: ProjectId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM project_features WHERE project_id = ?1;",
            [project_id],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative feature count {count}")))
    }
}

fn parse_feature_row(row: &Row<'_>) -> RepoResult<StoredFeature> {
    let id: FeatureId = row.get("id")?;

    let kind_text: String = row.get("geometry_type")?;
    let geometry_kind = GeometryKind::from_name(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid geometry type `{kind_text}` in project_features.geometry_type (id {id})"
        ))
    })?;

    let properties_text: String = row.get("properties")?;
    let properties: PropertyMap = serde_json::from_str(&properties_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid properties JSON in project_features.properties (id {id}): {err}"
        ))
    })?;

    let tag: String = row.get("type")?;
    if tag.is_empty() {
        return Err(RepoError::InvalidData(format!(
            "empty tag in project_features.type (id {id})"
        )));
    }

    Ok(StoredFeature {
        id,
        project_id: row.get("project_id")?,
        geometry: StoredGeometry::new(row.get::<_, String>("geometry")?),
        geometry_kind,
        tag,
        properties,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_feature_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "project_features")? {
        return Err(RepoError::MissingRequiredTable("project_features"));
    }
    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "project_features", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "project_features",
                column,
            });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
