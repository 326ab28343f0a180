use sea_orm::prelude::{DateTimeWithTimeZone, *};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vendors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning user; unclaimed profiles have none.
    #[sea_orm(unique)]
    pub user_id: Option<Uuid>,
    pub company_name: String,
    pub tier: VendorTier,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(
    Copy, Clone, Debug, Default, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum VendorTier {
    #[default]
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "tier1")]
    Tier1,
    #[sea_orm(string_value = "tier2")]
    Tier2,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "users::Entity",
        from = "Column::UserId",
        to = "users::Column::Id",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
