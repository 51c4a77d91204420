//! Court administration: registration, price grid maintenance, quotes and
//! device keys.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::booking::SlotTime;
use crate::domain::court::{generate_device_key, Court, NewCourt, SubCourt};
use crate::domain::pricing::{generate_grid, quote, validate_day_of_week, PriceGridEntry};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::support::time::SharedClock;

/// Device key of an owner's court together with the sub-courts it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceKeyInfo {
    /// `None` until one is generated
    pub device_key: Option<String>,
    pub court_id: i32,
    pub sub_courts: Vec<SubCourt>,
}

pub struct PricingService {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    default_price_per_hour: i64,
}

impl PricingService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock, default_price_per_hour: i64) -> Self {
        Self {
            repos,
            clock,
            default_price_per_hour,
        }
    }

    /// Create a court, its sub-courts and the full weekly price grid.
    pub async fn register_court(
        &self,
        owner_id: i32,
        name: &str,
        sub_court_names: &[&str],
    ) -> DomainResult<(Court, Vec<SubCourt>)> {
        if owner_id <= 0 {
            return Err(DomainError::InvalidInput(format!("invalid owner id {}", owner_id)));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidInput("court name is required".to_string()));
        }
        let sub_court_names: Vec<String> = sub_court_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        if sub_court_names.is_empty() {
            return Err(DomainError::InvalidInput(
                "at least one sub-court is required".to_string(),
            ));
        }
        if self.repos.courts().find_by_owner(owner_id).await?.is_some() {
            return Err(DomainError::InvalidState(format!(
                "user {} already owns a court",
                owner_id
            )));
        }

        let (court, sub_courts) = self
            .repos
            .courts()
            .create(
                NewCourt {
                    owner_id,
                    name: name.to_string(),
                    sub_court_names,
                    created_at: self.clock.now(),
                },
                generate_grid(0, self.default_price_per_hour),
            )
            .await?;
        info!(
            court_id = court.id,
            owner_id,
            sub_courts = sub_courts.len(),
            "🏟️ Court registered"
        );
        Ok((court, sub_courts))
    }

    pub async fn list_prices(&self, court_id: i32, day: Option<u8>) -> DomainResult<Vec<PriceGridEntry>> {
        if let Some(day) = day {
            validate_day_of_week(day)?;
        }
        self.repos.prices().list(court_id, day).await
    }

    /// Change one slot's price. Only the slot and weekday stay fixed.
    pub async fn update_price(
        &self,
        owner_id: i32,
        price_id: i32,
        price_per_hour: i64,
    ) -> DomainResult<PriceGridEntry> {
        validate_price(price_per_hour)?;
        let court = self.owned_court(owner_id).await?;
        let mut entry = self
            .repos
            .prices()
            .find_by_id(price_id)
            .await?
            .filter(|e| e.court_id == court.id)
            .ok_or_else(|| DomainError::NotFound {
                entity: "PriceGridEntry",
                field: "id",
                value: price_id.to_string(),
            })?;
        self.repos.prices().update_price(price_id, price_per_hour).await?;
        entry.price_per_hour = price_per_hour;
        Ok(entry)
    }

    /// Overwrite every slot of `day` lying inside `[start, end]`. Returns the
    /// number of slots changed.
    pub async fn bulk_update_prices(
        &self,
        owner_id: i32,
        day: u8,
        start: &str,
        end: &str,
        price_per_hour: i64,
    ) -> DomainResult<u64> {
        validate_day_of_week(day)?;
        validate_price(price_per_hour)?;
        let start = SlotTime::parse(start)?;
        let end = SlotTime::parse(end)?;
        if end <= start {
            return Err(DomainError::InvalidInput(format!(
                "start time {} must be before end time {}",
                start, end
            )));
        }

        let court = self.owned_court(owner_id).await?;
        let changed = self
            .repos
            .prices()
            .update_range(court.id, day, start, end, price_per_hour)
            .await?;
        if changed == 0 {
            return Err(DomainError::NotFound {
                entity: "PriceGridEntry",
                field: "range",
                value: format!("day {} {}-{}", day, start, end),
            });
        }
        info!(court_id = court.id, day, %start, %end, price_per_hour, changed, "Price range updated");
        Ok(changed)
    }

    /// Replace the grid of `to_day` with a copy of `from_day`.
    pub async fn copy_prices(&self, owner_id: i32, from_day: u8, to_day: u8) -> DomainResult<u64> {
        validate_day_of_week(from_day)?;
        validate_day_of_week(to_day)?;
        if from_day == to_day {
            return Err(DomainError::InvalidInput(
                "cannot copy a day's prices onto itself".to_string(),
            ));
        }

        let court = self.owned_court(owner_id).await?;
        let source = self.repos.prices().list(court.id, Some(from_day)).await?;
        if source.is_empty() {
            return Err(DomainError::NotFound {
                entity: "PriceGridEntry",
                field: "day_of_week",
                value: from_day.to_string(),
            });
        }
        let copied = self.repos.prices().replace_day(court.id, to_day, source).await?;
        info!(court_id = court.id, from_day, to_day, copied, "Prices copied");
        Ok(copied)
    }

    /// Price of `[start, end)` on `date` from the court's grid.
    pub async fn quote(&self, court_id: i32, date: NaiveDate, start: &str, end: &str) -> DomainResult<i64> {
        let start = SlotTime::parse(start)?;
        let end = SlotTime::parse(end)?;
        let entries = self.repos.prices().list(court_id, None).await?;
        quote(&entries, date, start, end)
    }

    pub async fn device_key(&self, owner_id: i32) -> DomainResult<DeviceKeyInfo> {
        let court = self.owned_court(owner_id).await?;
        self.device_key_info(court).await
    }

    /// Issue a fresh device key. Jobs already queued keep the key they were
    /// scheduled with.
    pub async fn regenerate_device_key(&self, owner_id: i32) -> DomainResult<DeviceKeyInfo> {
        let mut court = self.owned_court(owner_id).await?;
        let key = generate_device_key();
        self.repos.courts().set_device_key(court.id, &key).await?;
        info!(court_id = court.id, "🔑 Device key regenerated");
        court.device_key = Some(key);
        self.device_key_info(court).await
    }

    async fn device_key_info(&self, court: Court) -> DomainResult<DeviceKeyInfo> {
        let sub_courts = self.repos.courts().list_sub_courts(court.id).await?;
        Ok(DeviceKeyInfo {
            device_key: court.device_key,
            court_id: court.id,
            sub_courts,
        })
    }

    async fn owned_court(&self, owner_id: i32) -> DomainResult<Court> {
        self.repos
            .courts()
            .find_by_owner(owner_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Court",
                field: "owner_id",
                value: owner_id.to_string(),
            })
    }
}

fn validate_price(price_per_hour: i64) -> DomainResult<()> {
    if price_per_hour < 0 {
        return Err(DomainError::InvalidInput(format!(
            "price per hour must not be negative: {}",
            price_per_hour
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::support::time::SystemClock;

    async fn setup() -> (PricingService, Court) {
        let store = Arc::new(InMemoryStorage::new());
        let service = PricingService::new(store, Arc::new(SystemClock), 100_000);
        let (court, _) = service
            .register_court(10, "Riverside", &["Court 1", "Court 2"])
            .await
            .unwrap();
        (service, court)
    }

    #[tokio::test]
    async fn registration_creates_full_grid() {
        let (service, court) = setup().await;
        assert_eq!(service.list_prices(court.id, None).await.unwrap().len(), 336);
        let monday = service.list_prices(court.id, Some(1)).await.unwrap();
        assert_eq!(monday.len(), 48);
        assert!(monday.windows(2).all(|w| w[0].start < w[1].start));

        assert!(matches!(
            service.register_court(10, "Second", &["A"]).await,
            Err(DomainError::InvalidState(_))
        ));
        assert!(matches!(
            service.register_court(11, "  ", &["A"]).await,
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            service.register_court(11, "Empty", &[" "]).await,
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn bulk_update_covers_inclusive_range() {
        let (service, court) = setup().await;
        let changed = service
            .bulk_update_prices(10, 1, "17:00", "24:00", 160_000)
            .await
            .unwrap();
        assert_eq!(changed, 14);

        let monday: NaiveDate = "2026-01-05".parse().unwrap();
        assert_eq!(service.quote(court.id, monday, "16:30", "17:30").await.unwrap(), 130_000);

        assert!(matches!(
            service.bulk_update_prices(10, 1, "17:10", "17:20", 1).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            service.bulk_update_prices(10, 1, "18:00", "17:00", 1).await,
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            service.bulk_update_prices(99, 1, "17:00", "18:00", 1).await,
            Err(DomainError::NotFound { entity: "Court", .. })
        ));
    }

    #[tokio::test]
    async fn update_price_is_scoped_to_owner() {
        let (service, court) = setup().await;
        service.register_court(20, "Hilltop", &["Main"]).await.unwrap();
        let entry = service.list_prices(court.id, Some(0)).await.unwrap()[0].clone();

        assert!(matches!(
            service.update_price(20, entry.id, 1).await,
            Err(DomainError::NotFound { entity: "PriceGridEntry", .. })
        ));
        let updated = service.update_price(10, entry.id, 90_000).await.unwrap();
        assert_eq!(updated.price_per_hour, 90_000);
        assert_eq!(updated.start, entry.start);
    }

    #[tokio::test]
    async fn copy_replaces_target_day() {
        let (service, court) = setup().await;
        service
            .bulk_update_prices(10, 6, "00:00", "24:00", 150_000)
            .await
            .unwrap();
        assert_eq!(service.copy_prices(10, 6, 0).await.unwrap(), 48);

        let sunday = service.list_prices(court.id, Some(0)).await.unwrap();
        assert_eq!(sunday.len(), 48);
        assert!(sunday.iter().all(|e| e.price_per_hour == 150_000));
        assert!(matches!(
            service.copy_prices(10, 3, 3).await,
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn device_key_regeneration() {
        let (service, court) = setup().await;
        let info = service.device_key(10).await.unwrap();
        assert_eq!(info.device_key, None);
        assert_eq!(info.court_id, court.id);
        assert_eq!(info.sub_courts.len(), 2);

        let fresh = service.regenerate_device_key(10).await.unwrap();
        let key = fresh.device_key.clone().unwrap();
        assert_eq!(key.len(), 16);
        assert_eq!(service.device_key(10).await.unwrap().device_key, Some(key));
    }
}
