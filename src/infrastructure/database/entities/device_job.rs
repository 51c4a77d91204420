//! Scheduled light job entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "device_jobs")]
pub struct Model {
    /// Deterministic job id (`light-<hex>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub reservation_id: i32,
    pub sub_court_id: i32,

    /// Start of the light window the job belongs to
    pub window_start: DateTimeUtc,

    /// ACTIVATE / DEACTIVATE
    pub kind: String,

    pub court_id: i32,

    #[sea_orm(nullable)]
    pub device_key: Option<String>,

    pub run_at: DateTimeUtc,

    /// Queued, Dispatching, Exhausted
    pub state: String,

    pub attempts: i32,

    #[sea_orm(nullable)]
    pub last_error: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
