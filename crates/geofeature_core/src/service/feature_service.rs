//! Project feature use-case service.
//!
//! # Responsibility
//! - Run reconciliation inside one SQLite transaction per call.
//! - Provide the read path and dry-run planning for callers.
//!
//! # Invariants
//! - Plans are applied delete-first, then insert, and only committed when
//!   the applied counts match the plan.
//! - Reconciliations take an `IMMEDIATE` write lock, so two runs against the
//!   same database never plan from the same "before" state.

use crate::geometry::GeometryCodec;
use crate::model::collection::{FeatureCollectionInput, PresentedCollection};
use crate::model::feature::ProjectId;
use crate::repo::feature_repo::{FeatureRepository, SqliteFeatureRepository};
use crate::service::presentation::present_collection;
use crate::service::reconciler::{
    ensure_project_id, plan_reconciliation, ReconcileError, ReconcilePlan, ReconcileReport,
    ReconcileResult,
};
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;
use uuid::Uuid;

/// Plans and applies a reconciliation against any repository.
///
/// The caller owns the transaction boundary; on error nothing here undoes
/// writes already made through `repo`.
pub fn reconcile_with_repository<R, C>(
    repo: &R,
    codec: &C,
    project_id: ProjectId,
    input: Option<&FeatureCollectionInput>,
) -> ReconcileResult<ReconcileReport>
where
    R: FeatureRepository + ?Sized,
    C: GeometryCodec + ?Sized,
{
    ensure_project_id(project_id)?;
    let run_id = Uuid::new_v4();
    let started_at = Instant::now();
    let targets = input.map(FeatureCollectionInput::targets).unwrap_or(&[]);
    info!(
        "event=feature_reconcile module=service status=start run_id={} project_id={} targets={}",
        run_id,
        project_id,
        targets.len()
    );

    let outcome = repo
        .list_features(project_id)
        .map_err(ReconcileError::from)
        .and_then(|stored| plan_reconciliation(codec, project_id, targets, &stored))
        .and_then(|plan| {
            apply_plan(repo, &plan)?;
            Ok(plan.report(run_id, true))
        });

    match &outcome {
        Ok(report) => info!(
            "event=feature_reconcile module=service status=ok run_id={} project_id={} inserted={} deleted={} unchanged={} duration_ms={}",
            run_id,
            project_id,
            report.inserted,
            report.deleted,
            report.unchanged,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=feature_reconcile module=service status=error run_id={} project_id={} duration_ms={} error_code={} error={}",
            run_id,
            project_id,
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    outcome
}

/// Applies a plan: deletes first, then inserts.
///
/// # Errors
/// - `Storage` when the repository fails.
/// - `Unexpected` when the repository applied a different number of rows.
pub fn apply_plan<R: FeatureRepository + ?Sized>(
    repo: &R,
    plan: &ReconcilePlan,
) -> ReconcileResult<()> {
    let deleted = repo.delete_features(&plan.to_delete)?;
    if deleted != plan.to_delete.len() {
        return Err(ReconcileError::Unexpected(format!(
            "planned {} deletions for project {}, storage removed {deleted}",
            plan.to_delete.len(),
            plan.project_id
        )));
    }

    let inserted = repo.insert_features(plan.project_id, &plan.to_insert)?;
    if inserted.len() != plan.to_insert.len() {
        return Err(ReconcileError::Unexpected(format!(
            "planned {} insertions for project {}, storage created {}",
            plan.to_insert.len(),
            plan.project_id,
            inserted.len()
        )));
    }
    Ok(())
}

/// SQLite-backed service for project feature use-cases.
pub struct FeatureService<'conn, C: GeometryCodec> {
    conn: &'conn mut Connection,
    codec: C,
}

impl<'conn, C: GeometryCodec> FeatureService<'conn, C> {
    /// Creates a service over a migrated connection.
    pub fn try_new(conn: &'conn mut Connection, codec: C) -> ReconcileResult<Self> {
        SqliteFeatureRepository::try_new(conn)?;
        Ok(Self { conn, codec })
    }

    /// Makes the project's stored features match `input`, atomically.
    ///
    /// `None` or an empty collection deletes every feature of the project.
    pub fn update_project_features(
        &mut self,
        project_id: ProjectId,
        input: Option<&FeatureCollectionInput>,
    ) -> ReconcileResult<ReconcileReport> {
        ensure_project_id(project_id)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = SqliteFeatureRepository::try_new(&tx)
            .map_err(ReconcileError::from)
            .and_then(|repo| reconcile_with_repository(&repo, &self.codec, project_id, input));

        match outcome {
            Ok(report) => {
                tx.commit()?;
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event=feature_rollback module=service status=error project_id={} error={}",
                        project_id, rollback_err
                    );
                } else {
                    warn!(
                        "event=feature_rollback module=service status=ok project_id={} error_code={}",
                        project_id,
                        err.code()
                    );
                }
                Err(err)
            }
        }
    }

    /// Computes what `update_project_features` would do, without writing.
    pub fn preview_project_features(
        &self,
        project_id: ProjectId,
        input: Option<&FeatureCollectionInput>,
    ) -> ReconcileResult<ReconcileReport> {
        ensure_project_id(project_id)?;
        let repo = SqliteFeatureRepository::try_new(&*self.conn)?;
        let stored = repo.list_features(project_id)?;
        let targets = input.map(FeatureCollectionInput::targets).unwrap_or(&[]);
        let plan = plan_reconciliation(&self.codec, project_id, targets, &stored)?;
        Ok(plan.report(Uuid::new_v4(), false))
    }

    /// Returns the project's features as a GeoJSON collection.
    pub fn get_project_features(&self, project_id: ProjectId) -> ReconcileResult<PresentedCollection> {
        ensure_project_id(project_id)?;
        let repo = SqliteFeatureRepository::try_new(&*self.conn)?;
        let stored = repo.list_features(project_id)?;
        info!(
            "event=feature_list module=service status=ok project_id={} count={}",
            project_id,
            stored.len()
        );
        Ok(present_collection(&self.codec, &stored))
    }

    /// Counts the project's stored features.
    pub fn count_project_features(&self, project_id: ProjectId) -> ReconcileResult<usize> {
        ensure_project_id(project_id)?;
        let repo = SqliteFeatureRepository::try_new(&*self.conn)?;
        Ok(repo.count_features(project_id)?)
    }
}
