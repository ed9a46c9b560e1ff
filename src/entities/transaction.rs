//! Transaction entity - The audit record of a single transfer attempt.
//!
//! Every attempt whose cards could be resolved leaves exactly one row, whatever its
//! outcome. Rows are written once and never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Provisional, never persisted
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Rejected for lack of funds or balance overflow
    #[sea_orm(string_value = "FAILED")]
    Failed,
    /// Rejected because the cards have different owners
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_card_id: i64,
    pub to_card_id: i64,
    /// Always positive, minor currency units
    pub amount: i64,
    pub timestamp: DateTimeUtc,
    pub status: TransactionStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::FromCardId",
        to = "super::card::Column::Id"
    )]
    FromCard,
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::ToCardId",
        to = "super::card::Column::Id"
    )]
    ToCard,
}

impl ActiveModelBehavior for ActiveModel {}
