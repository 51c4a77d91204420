//! SeaORM implementation of PriceRepository

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::debug;

use super::court_repository::{price_to_active, GRID_INSERT_CHUNK};
use crate::domain::booking::SlotTime;
use crate::domain::pricing::{PriceGridEntry, PriceRepository};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::court_price;

pub struct SeaOrmPriceRepository {
    db: DatabaseConnection,
}

impl SeaOrmPriceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Stored minute column back to a [`SlotTime`].
pub(super) fn slot_time(minutes: i32) -> DomainResult<SlotTime> {
    u16::try_from(minutes)
        .ok()
        .and_then(|m| SlotTime::from_minutes(m).ok())
        .ok_or_else(|| DomainError::Storage(format!("corrupt time column: {} minutes", minutes)))
}

fn model_to_domain(m: court_price::Model) -> DomainResult<PriceGridEntry> {
    let day_of_week = match m.day_of_week {
        Some(d) => Some(u8::try_from(d).map_err(|_| {
            DomainError::Storage(format!("corrupt day_of_week {} on price {}", d, m.id))
        })?),
        None => None,
    };
    Ok(PriceGridEntry {
        id: m.id,
        court_id: m.court_id,
        day_of_week,
        start: slot_time(m.start_minute)?,
        end: slot_time(m.end_minute)?,
        price_per_hour: m.price_per_hour,
    })
}

#[async_trait]
impl PriceRepository for SeaOrmPriceRepository {
    async fn list(&self, court_id: i32, day: Option<u8>) -> DomainResult<Vec<PriceGridEntry>> {
        let mut query = court_price::Entity::find().filter(court_price::Column::CourtId.eq(court_id));
        if let Some(day) = day {
            query = query.filter(court_price::Column::DayOfWeek.eq(i32::from(day)));
        }
        let models = query
            .order_by_asc(court_price::Column::DayOfWeek)
            .order_by_asc(court_price::Column::StartMinute)
            .all(&self.db)
            .await?;
        models.into_iter().map(model_to_domain).collect()
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<PriceGridEntry>> {
        court_price::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn update_price(&self, id: i32, price_per_hour: i64) -> DomainResult<()> {
        let result = court_price::Entity::update_many()
            .col_expr(court_price::Column::PricePerHour, Expr::value(price_per_hour))
            .filter(court_price::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "Price",
                field: "id",
                value: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_range(
        &self,
        court_id: i32,
        day: u8,
        start: SlotTime,
        end: SlotTime,
        price_per_hour: i64,
    ) -> DomainResult<u64> {
        let result = court_price::Entity::update_many()
            .col_expr(court_price::Column::PricePerHour, Expr::value(price_per_hour))
            .filter(court_price::Column::CourtId.eq(court_id))
            .filter(court_price::Column::DayOfWeek.eq(i32::from(day)))
            .filter(court_price::Column::StartMinute.gte(i32::from(start.minutes())))
            .filter(court_price::Column::EndMinute.lte(i32::from(end.minutes())))
            .exec(&self.db)
            .await?;
        debug!(court_id, day, %start, %end, rows = result.rows_affected, "Price range updated");
        Ok(result.rows_affected)
    }

    async fn replace_day(
        &self,
        court_id: i32,
        day: u8,
        entries: Vec<PriceGridEntry>,
    ) -> DomainResult<u64> {
        let txn = self.db.begin().await?;

        court_price::Entity::delete_many()
            .filter(court_price::Column::CourtId.eq(court_id))
            .filter(court_price::Column::DayOfWeek.eq(i32::from(day)))
            .exec(&txn)
            .await?;

        for chunk in entries.chunks(GRID_INSERT_CHUNK) {
            let rows = chunk.iter().map(|e| {
                let mut row = price_to_active(court_id, e);
                row.day_of_week = sea_orm::Set(Some(i32::from(day)));
                row
            });
            court_price::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(entries.len() as u64)
    }
}
