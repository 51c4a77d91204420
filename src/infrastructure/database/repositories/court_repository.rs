//! SeaORM implementation of CourtRepository

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use crate::domain::court::{Court, CourtRepository, NewCourt, SubCourt};
use crate::domain::pricing::PriceGridEntry;
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{court, court_price, sub_court};

/// Rows per multi-row INSERT when writing a price grid.
pub(super) const GRID_INSERT_CHUNK: usize = 100;

pub struct SeaOrmCourtRepository {
    db: DatabaseConnection,
}

impl SeaOrmCourtRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn court_to_domain(m: court::Model) -> Court {
    Court {
        id: m.id,
        owner_id: m.owner_id,
        name: m.name,
        device_key: m.device_key,
        is_active: m.is_active,
        created_at: m.created_at,
    }
}

fn sub_court_to_domain(m: sub_court::Model) -> SubCourt {
    SubCourt {
        id: m.id,
        court_id: m.court_id,
        name: m.name,
        is_active: m.is_active,
    }
}

pub(super) fn price_to_active(court_id: i32, e: &PriceGridEntry) -> court_price::ActiveModel {
    court_price::ActiveModel {
        id: NotSet,
        court_id: Set(court_id),
        day_of_week: Set(e.day_of_week.map(i32::from)),
        start_minute: Set(i32::from(e.start.minutes())),
        end_minute: Set(i32::from(e.end.minutes())),
        price_per_hour: Set(e.price_per_hour),
    }
}

// ── CourtRepository impl ────────────────────────────────────────

#[async_trait]
impl CourtRepository for SeaOrmCourtRepository {
    async fn create(
        &self,
        new_court: NewCourt,
        grid: Vec<PriceGridEntry>,
    ) -> DomainResult<(Court, Vec<SubCourt>)> {
        debug!(owner_id = new_court.owner_id, name = %new_court.name, "Creating court");

        let txn = self.db.begin().await?;

        let court_model = court::ActiveModel {
            id: NotSet,
            owner_id: Set(new_court.owner_id),
            name: Set(new_court.name),
            device_key: Set(None),
            is_active: Set(true),
            created_at: Set(new_court.created_at),
        }
        .insert(&txn)
        .await?;

        let mut sub_courts = Vec::with_capacity(new_court.sub_court_names.len());
        for name in new_court.sub_court_names {
            let model = sub_court::ActiveModel {
                id: NotSet,
                court_id: Set(court_model.id),
                name: Set(name),
                is_active: Set(true),
            }
            .insert(&txn)
            .await?;
            sub_courts.push(sub_court_to_domain(model));
        }

        for chunk in grid.chunks(GRID_INSERT_CHUNK) {
            let rows = chunk.iter().map(|e| price_to_active(court_model.id, e));
            court_price::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok((court_to_domain(court_model), sub_courts))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Court>> {
        let model = court::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(court_to_domain))
    }

    async fn find_by_owner(&self, owner_id: i32) -> DomainResult<Option<Court>> {
        let model = court::Entity::find()
            .filter(court::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?;
        Ok(model.map(court_to_domain))
    }

    async fn find_sub_courts(&self, ids: &[i32]) -> DomainResult<Vec<SubCourt>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = sub_court::Entity::find()
            .filter(sub_court::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(sub_court::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(sub_court_to_domain).collect())
    }

    async fn list_sub_courts(&self, court_id: i32) -> DomainResult<Vec<SubCourt>> {
        let models = sub_court::Entity::find()
            .filter(sub_court::Column::CourtId.eq(court_id))
            .order_by_asc(sub_court::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(sub_court_to_domain).collect())
    }

    async fn set_device_key(&self, court_id: i32, device_key: &str) -> DomainResult<()> {
        let result = court::Entity::update_many()
            .col_expr(court::Column::DeviceKey, Expr::value(device_key))
            .filter(court::Column::Id.eq(court_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "Court",
                field: "id",
                value: court_id.to_string(),
            });
        }
        Ok(())
    }
}
