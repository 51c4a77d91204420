//! Court entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "courts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_id: i32,
    pub name: String,

    /// Routing key of the venue's light controller
    #[sea_orm(nullable)]
    pub device_key: Option<String>,

    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sub_court::Entity")]
    SubCourts,
    #[sea_orm(has_many = "super::court_price::Entity")]
    Prices,
}

impl Related<super::sub_court::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubCourts.def()
    }
}

impl Related<super::court_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
