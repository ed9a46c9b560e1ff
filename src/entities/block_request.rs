//! Card block request entity - A cardholder's request to block one of their cards.
//!
//! `pending_card_id` mirrors `card_id` while the request is pending and is cleared
//! when an administrator resolves it. The column is unique, so the database itself
//! rejects a second pending request for the same card. Resolved requests are kept
//! as history with their terminal status.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockRequestStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

/// Block request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "card_block_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Requesting cardholder
    pub user_id: i64,
    pub card_id: i64,
    pub status: BlockRequestStatus,
    pub created_at: DateTimeUtc,
    pub processed_at: Option<DateTimeUtc>,
    /// Administrator who resolved the request
    pub processed_by: Option<i64>,
    #[sea_orm(unique)]
    pub pending_card_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::CardId",
        to = "super::card::Column::Id"
    )]
    Card,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    Requester,
}

impl Related<super::card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Card.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
