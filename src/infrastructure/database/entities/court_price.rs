//! Price grid entry entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "court_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub court_id: i32,

    /// 0 = Sunday .. 6 = Saturday, NULL = any day
    #[sea_orm(nullable)]
    pub day_of_week: Option<i32>,

    /// Minutes since midnight
    pub start_minute: i32,
    pub end_minute: i32,

    pub price_per_hour: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::court::Entity",
        from = "Column::CourtId",
        to = "super::court::Column::Id"
    )]
    Court,
}

impl Related<super::court::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Court.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
