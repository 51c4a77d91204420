//! SeaORM implementation of BookingRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    IsolationLevel, NotSet, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use tracing::{debug, warn};

use super::price_repository::slot_time;
use crate::domain::booking::conflict::{check_against_existing, dates, sub_court_ids};
use crate::domain::booking::{
    BookedSlot, Booking, BookingItem, BookingRepository, BookingRevision, BookingStatus,
    NewBooking,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{booking, booking_item};

pub struct SeaOrmBookingRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn parse_status(raw: &str, booking_id: i32) -> DomainResult<BookingStatus> {
    BookingStatus::from_str(raw).ok_or_else(|| {
        DomainError::Storage(format!("unknown status '{}' on booking {}", raw, booking_id))
    })
}

fn item_to_domain(m: booking_item::Model) -> DomainResult<BookingItem> {
    Ok(BookingItem {
        id: m.id,
        booking_id: m.booking_id,
        sub_court_id: m.sub_court_id,
        date: m.date,
        start: slot_time(m.start_minute)?,
        end: slot_time(m.end_minute)?,
        price: m.price,
    })
}

fn booking_to_domain(m: booking::Model, items: Vec<BookingItem>) -> DomainResult<Booking> {
    Ok(Booking {
        status: parse_status(&m.status, m.id)?,
        id: m.id,
        user_id: m.user_id,
        court_id: m.court_id,
        note: m.note,
        total_price: m.total_price,
        receipt_url: m.receipt_url,
        expired_at: m.expired_at,
        created_at: m.created_at,
        updated_at: m.updated_at,
        items,
    })
}

// ── Queries shared by plain reads and the write transaction ────

/// Items on the given sub-courts and dates whose booking still holds them.
async fn active_slots<C: ConnectionTrait>(
    conn: &C,
    sub_court_ids: &[i32],
    dates: &[NaiveDate],
) -> DomainResult<Vec<BookedSlot>> {
    if sub_court_ids.is_empty() || dates.is_empty() {
        return Ok(Vec::new());
    }
    let voided = BookingStatus::VOIDED.iter().map(|s| s.as_str());
    let rows = booking_item::Entity::find()
        .find_also_related(booking::Entity)
        .filter(booking_item::Column::SubCourtId.is_in(sub_court_ids.iter().copied()))
        .filter(booking_item::Column::Date.is_in(dates.iter().copied()))
        .filter(booking::Column::Status.is_not_in(voided))
        .all(conn)
        .await?;

    let mut slots = Vec::with_capacity(rows.len());
    for (item, parent) in rows {
        let Some(parent) = parent else {
            warn!(item_id = item.id, "Booking item without booking, skipping");
            continue;
        };
        slots.push(BookedSlot {
            booking_id: item.booking_id,
            sub_court_id: item.sub_court_id,
            date: item.date,
            start: slot_time(item.start_minute)?,
            end: slot_time(item.end_minute)?,
            status: parse_status(&parent.status, parent.id)?,
        });
    }
    Ok(slots)
}

/// Items of the given bookings grouped by booking id, in insertion order.
async fn load_items<C: ConnectionTrait>(
    conn: &C,
    booking_ids: &[i32],
) -> DomainResult<HashMap<i32, Vec<BookingItem>>> {
    let mut grouped: HashMap<i32, Vec<BookingItem>> = HashMap::new();
    if booking_ids.is_empty() {
        return Ok(grouped);
    }
    let models = booking_item::Entity::find()
        .filter(booking_item::Column::BookingId.is_in(booking_ids.iter().copied()))
        .order_by_asc(booking_item::Column::Id)
        .all(conn)
        .await?;
    for m in models {
        grouped.entry(m.booking_id).or_default().push(item_to_domain(m)?);
    }
    Ok(grouped)
}

// ── BookingRepository impl ──────────────────────────────────────

#[async_trait]
impl BookingRepository for SeaOrmBookingRepository {
    async fn find_active_slots(
        &self,
        sub_court_ids: &[i32],
        dates: &[NaiveDate],
    ) -> DomainResult<Vec<BookedSlot>> {
        active_slots(&self.db, sub_court_ids, dates).await
    }

    async fn create_checked(&self, new_booking: NewBooking) -> DomainResult<Booking> {
        let isolation = match self.db.get_database_backend() {
            DbBackend::Postgres => Some(IsolationLevel::Serializable),
            _ => None,
        };
        let txn = self.db.begin_with_config(isolation, None).await?;

        let existing = active_slots(
            &txn,
            &sub_court_ids(&new_booking.items),
            &dates(&new_booking.items),
        )
        .await?;
        if let Err(conflict) = check_against_existing(&new_booking.items, &existing) {
            txn.rollback().await?;
            return Err(conflict);
        }

        let model = booking::ActiveModel {
            id: NotSet,
            user_id: Set(new_booking.user_id),
            court_id: Set(new_booking.court_id),
            note: Set(new_booking.note),
            total_price: Set(new_booking.total_price),
            receipt_url: Set(None),
            status: Set(new_booking.status.as_str().to_string()),
            expired_at: Set(new_booking.expired_at),
            created_at: Set(new_booking.created_at),
            updated_at: Set(new_booking.created_at),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(new_booking.items.len());
        for slot in new_booking.items {
            let item = booking_item::ActiveModel {
                id: NotSet,
                booking_id: Set(model.id),
                sub_court_id: Set(slot.sub_court_id),
                date: Set(slot.date),
                start_minute: Set(i32::from(slot.start.minutes())),
                end_minute: Set(i32::from(slot.end.minutes())),
                price: Set(slot.price),
            }
            .insert(&txn)
            .await?;
            items.push(item_to_domain(item)?);
        }

        txn.commit().await?;
        debug!(booking_id = model.id, items = items.len(), "Booking committed");
        booking_to_domain(model, items)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>> {
        let Some(model) = booking::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let items = load_items(&self.db, &[id]).await?.remove(&id).unwrap_or_default();
        booking_to_domain(model, items).map(Some)
    }

    async fn update(&self, b: &Booking, expected: &BookingRevision) -> DomainResult<()> {
        debug!(booking_id = b.id, status = %b.status, "Updating booking");

        let mut query = booking::Entity::update_many()
            .col_expr(booking::Column::Status, Expr::value(b.status.as_str()))
            .col_expr(booking::Column::ReceiptUrl, Expr::value(b.receipt_url.clone()))
            .col_expr(booking::Column::ExpiredAt, Expr::value(b.expired_at))
            .col_expr(booking::Column::UpdatedAt, Expr::value(b.updated_at))
            .filter(booking::Column::Id.eq(b.id))
            .filter(booking::Column::Status.eq(expected.status.as_str()));
        query = match &expected.receipt_url {
            Some(url) => query.filter(booking::Column::ReceiptUrl.eq(url.as_str())),
            None => query.filter(booking::Column::ReceiptUrl.is_null()),
        };
        query = match expected.expired_at {
            Some(at) => query.filter(booking::Column::ExpiredAt.eq(at)),
            None => query.filter(booking::Column::ExpiredAt.is_null()),
        };

        if query.exec(&self.db).await?.rows_affected > 0 {
            return Ok(());
        }
        if booking::Entity::find_by_id(b.id).one(&self.db).await?.is_none() {
            return Err(DomainError::NotFound {
                entity: "Booking",
                field: "id",
                value: b.id.to_string(),
            });
        }
        Err(DomainError::InvalidState(format!(
            "booking {} was changed by another request",
            b.id
        )))
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .filter(booking::Column::ReceiptUrl.is_null())
            .filter(booking::Column::ExpiredAt.is_not_null())
            .filter(booking::Column::ExpiredAt.lt(now))
            .order_by_asc(booking::Column::Id)
            .all(&self.db)
            .await?;

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let mut items = load_items(&self.db, &ids).await?;
        models
            .into_iter()
            .map(|m| {
                let booking_items = items.remove(&m.id).unwrap_or_default();
                booking_to_domain(m, booking_items)
            })
            .collect()
    }
}
