//! Caller-facing views of the stored entities.
//!
//! Every outward card number is masked down to its last four digits, expiry dates
//! are rendered as `MM/yy`, and password hashes are never carried over.

use crate::entities::{
    BlockRequestModel, CardModel, CardStatus, Role, TransactionModel, TransactionStatus,
    UserModel, UserStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

const MASK: &str = "**** **** **** ";

/// Replaces everything but the last four digits with the fixed mask.
#[must_use]
pub fn mask_card_number(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("{MASK}{tail}")
}

#[must_use]
pub fn format_expiry_date(date: NaiveDate) -> String {
    date.format("%m/%y").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub id: i64,
    pub masked_number: String,
    pub owner_id: i64,
    pub owner_name: String,
    /// `MM/yy`
    pub expiry_date: String,
    pub status: CardStatus,
    pub balance: i64,
}

impl CardView {
    #[must_use]
    pub fn new(card: &CardModel, owner: &UserModel) -> Self {
        Self {
            id: card.id,
            masked_number: mask_card_number(&card.number),
            owner_id: card.owner_id,
            owner_name: owner.name.clone(),
            expiry_date: format_expiry_date(card.expiry_date),
            status: card.status,
            balance: card.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub from_card_number: String,
    pub to_card_number: String,
    pub amount: i64,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

impl TransactionView {
    #[must_use]
    pub fn new(transaction: &TransactionModel, from_card: &CardModel, to_card: &CardModel) -> Self {
        Self {
            id: transaction.id,
            from_card_number: mask_card_number(&from_card.number),
            to_card_number: mask_card_number(&to_card.number),
            amount: transaction.amount,
            status: transaction.status,
            timestamp: transaction.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRequestView {
    pub id: i64,
    pub owner_id: i64,
    pub masked_number: String,
    pub created_at: DateTime<Utc>,
}

impl BlockRequestView {
    #[must_use]
    pub fn new(request: &BlockRequestModel, card: &CardModel) -> Self {
        Self {
            id: request.id,
            owner_id: request.user_id,
            masked_number: mask_card_number(&card.number),
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
}

impl From<&UserModel> for UserView {
    fn from(user: &UserModel) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            status: user.status,
        }
    }
}
