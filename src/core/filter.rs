//! Filters and paging for list queries.
//!
//! Each filter turns into a conjunction of the predicates that are present, with
//! inclusive bounds. An empty filter matches everything.

use crate::{
    entities::{BlockRequestStatus, CardStatus, block_request, card},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{Condition, prelude::*, sea_query::SimpleExpr};
use serde::{Deserialize, Serialize};

/// Sort direction for paged queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl From<SortOrder> for sea_orm::Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Self::Asc,
            SortOrder::Desc => Self::Desc,
        }
    }
}

const DEFAULT_PAGE_SIZE: u64 = 5;

/// A page request. `page` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    pub order: SortOrder,
}

impl PageRequest {
    #[must_use]
    pub const fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            order: SortOrder::Desc,
        }
    }

    #[must_use]
    pub const fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::bad_request("Page size must be positive"));
        }
        Ok(())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Builds `Condition::all()` from the predicates that are present.
fn conjunction(predicates: impl IntoIterator<Item = Option<SimpleExpr>>) -> Condition {
    predicates
        .into_iter()
        .flatten()
        .fold(Condition::all(), |condition, expr| condition.add(expr))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFilter {
    pub status: Option<CardStatus>,
    /// Earliest expiry date, inclusive
    pub expires_from: Option<NaiveDate>,
    /// Latest expiry date, inclusive
    pub expires_to: Option<NaiveDate>,
    pub min_balance: Option<i64>,
    pub max_balance: Option<i64>,
    pub owner_id: Option<i64>,
}

impl CardFilter {
    #[must_use]
    pub fn condition(&self) -> Condition {
        conjunction([
            self.status.map(|s| card::Column::Status.eq(s)),
            self.expires_from.map(|d| card::Column::ExpiryDate.gte(d)),
            self.expires_to.map(|d| card::Column::ExpiryDate.lte(d)),
            self.min_balance.map(|b| card::Column::Balance.gte(b)),
            self.max_balance.map(|b| card::Column::Balance.lte(b)),
            self.owner_id.map(|id| card::Column::OwnerId.eq(id)),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequestFilter {
    pub status: Option<BlockRequestStatus>,
    /// Inclusive lower bound on `created_at`
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
}

impl BlockRequestFilter {
    #[must_use]
    pub fn condition(&self) -> Condition {
        conjunction([
            self.status.map(|s| block_request::Column::Status.eq(s)),
            self.created_after
                .map(|t| block_request::Column::CreatedAt.gte(t)),
            self.created_before
                .map(|t| block_request::Column::CreatedAt.lte(t)),
        ])
    }
}
