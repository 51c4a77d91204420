//! SeaORM implementation of LightJobQueue
//!
//! The `device_jobs` table is the queue. Claims are conditional UPDATEs on the
//! row's observed state, so concurrent dispatchers never claim the same job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use tracing::{debug, warn};

use crate::domain::device::{
    EnqueueOutcome, JobKey, JobState, LightEventKind, LightJob, LightJobQueue,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::device_job;

pub struct SeaOrmLightJobQueue {
    db: DatabaseConnection,
}

impl SeaOrmLightJobQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: device_job::Model) -> DomainResult<LightJob> {
    let kind = LightEventKind::from_str(&m.kind).ok_or_else(|| {
        DomainError::Storage(format!("unknown event kind '{}' on job {}", m.kind, m.id))
    })?;
    Ok(LightJob {
        key: JobKey::new(m.reservation_id, m.sub_court_id, m.window_start, kind),
        id: m.id,
        court_id: m.court_id,
        device_key: m.device_key,
        run_at: m.run_at,
        state: JobState::from_str(&m.state),
        attempts: u32::try_from(m.attempts).unwrap_or(0),
        last_error: m.last_error,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn domain_to_active(job: &LightJob) -> device_job::ActiveModel {
    device_job::ActiveModel {
        id: Set(job.id.clone()),
        reservation_id: Set(job.key.reservation_id),
        sub_court_id: Set(job.key.sub_court_id),
        window_start: Set(job.key.window_start),
        kind: Set(job.key.kind.as_str().to_string()),
        court_id: Set(job.court_id),
        device_key: Set(job.device_key.clone()),
        run_at: Set(job.run_at),
        state: Set(job.state.as_str().to_string()),
        attempts: Set(job.attempts as i32),
        last_error: Set(job.last_error.clone()),
        created_at: Set(job.created_at),
        updated_at: Set(job.updated_at),
    }
}

fn dispatching() -> &'static str {
    JobState::Dispatching.as_str()
}

// ── LightJobQueue impl ──────────────────────────────────────────

#[async_trait]
impl LightJobQueue for SeaOrmLightJobQueue {
    async fn enqueue(&self, job: LightJob) -> DomainResult<EnqueueOutcome> {
        let replaced = device_job::Entity::update_many()
            .col_expr(device_job::Column::CourtId, Expr::value(job.court_id))
            .col_expr(device_job::Column::DeviceKey, Expr::value(job.device_key.clone()))
            .col_expr(device_job::Column::RunAt, Expr::value(job.run_at))
            .col_expr(device_job::Column::State, Expr::value(JobState::Queued.as_str()))
            .col_expr(device_job::Column::Attempts, Expr::value(0))
            .col_expr(device_job::Column::LastError, Expr::value(Option::<String>::None))
            .col_expr(device_job::Column::UpdatedAt, Expr::value(job.updated_at))
            .filter(device_job::Column::Id.eq(job.id.as_str()))
            .filter(device_job::Column::State.ne(dispatching()))
            .exec(&self.db)
            .await?;
        if replaced.rows_affected > 0 {
            debug!(job_id = %job.id, run_at = %job.run_at, "Light job replaced");
            return Ok(EnqueueOutcome::Replaced);
        }

        let inserted = device_job::Entity::insert(domain_to_active(&job))
            .on_conflict(
                OnConflict::column(device_job::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        if inserted > 0 {
            debug!(job_id = %job.id, run_at = %job.run_at, "Light job queued");
            Ok(EnqueueOutcome::Inserted)
        } else {
            // Row exists and the replace above skipped it: it is being dispatched
            Ok(EnqueueOutcome::InFlight)
        }
    }

    async fn remove_for_sub_court(&self, reservation_id: i32, sub_court_id: i32) -> DomainResult<u64> {
        let result = device_job::Entity::delete_many()
            .filter(device_job::Column::ReservationId.eq(reservation_id))
            .filter(device_job::Column::SubCourtId.eq(sub_court_id))
            .filter(device_job::Column::State.ne(dispatching()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find(&self, job_id: &str) -> DomainResult<Option<LightJob>> {
        device_job::Entity::find_by_id(job_id.to_string())
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<LightJob>> {
        let candidates = device_job::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(device_job::Column::State.eq(JobState::Queued.as_str()))
                            .add(device_job::Column::RunAt.lte(now)),
                    )
                    .add(
                        Condition::all()
                            .add(device_job::Column::State.eq(dispatching()))
                            .add(device_job::Column::UpdatedAt.lt(stale_before)),
                    ),
            )
            .order_by_asc(device_job::Column::RunAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for mut model in candidates {
            let result = device_job::Entity::update_many()
                .col_expr(device_job::Column::State, Expr::value(dispatching()))
                .col_expr(device_job::Column::UpdatedAt, Expr::value(now))
                .filter(device_job::Column::Id.eq(model.id.as_str()))
                .filter(device_job::Column::State.eq(model.state.as_str()))
                .filter(device_job::Column::UpdatedAt.eq(model.updated_at))
                .exec(&self.db)
                .await?;
            if result.rows_affected == 0 {
                // Another dispatcher (or a replace) got there first
                continue;
            }
            if model.state == dispatching() {
                warn!(job_id = %model.id, since = %model.updated_at, "Reclaiming stale light job");
            }
            model.state = dispatching().to_string();
            model.updated_at = now;
            claimed.push(model_to_domain(model)?);
        }
        Ok(claimed)
    }

    async fn complete(&self, job_id: &str) -> DomainResult<()> {
        device_job::Entity::delete_many()
            .filter(device_job::Column::Id.eq(job_id))
            .filter(device_job::Column::State.eq(dispatching()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn retry_later(
        &self,
        job_id: &str,
        attempts: u32,
        retry_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let result = device_job::Entity::update_many()
            .col_expr(device_job::Column::State, Expr::value(JobState::Queued.as_str()))
            .col_expr(device_job::Column::Attempts, Expr::value(attempts as i32))
            .col_expr(device_job::Column::RunAt, Expr::value(retry_at))
            .col_expr(device_job::Column::LastError, Expr::value(error))
            .col_expr(device_job::Column::UpdatedAt, Expr::value(now))
            .filter(device_job::Column::Id.eq(job_id))
            .filter(device_job::Column::State.eq(dispatching()))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            warn!(job_id, "Light job vanished before retry was recorded");
        }
        Ok(())
    }

    async fn mark_exhausted(
        &self,
        job_id: &str,
        attempts: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        device_job::Entity::update_many()
            .col_expr(device_job::Column::State, Expr::value(JobState::Exhausted.as_str()))
            .col_expr(device_job::Column::Attempts, Expr::value(attempts as i32))
            .col_expr(device_job::Column::LastError, Expr::value(error))
            .col_expr(device_job::Column::UpdatedAt, Expr::value(now))
            .filter(device_job::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
