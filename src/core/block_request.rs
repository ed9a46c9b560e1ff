//! Card block workflow - cardholders ask for a card to be blocked, administrators
//! approve or reject.
//!
//! A request moves `PENDING -> APPROVED` or `PENDING -> REJECTED` and never again.
//! Resolved requests stay in the table as history; they leave the pending set by
//! status and by clearing `pending_card_id`, whose unique index keeps at most one
//! pending request per card even under concurrent creation.

use crate::{
    core::{
        caller::Caller,
        card::require_card,
        filter::{BlockRequestFilter, Page, PageRequest},
        user::{find_user_by_id, require_user},
    },
    entities::{BlockRequest, BlockRequestStatus, Card, CardStatus, Role, block_request, card},
    errors::{Error, Result},
    views::BlockRequestView,
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use std::str::FromStr;
use tracing::{info, instrument};

/// An administrator's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDecision {
    Approve,
    Reject,
}

impl BlockDecision {
    const fn status(self) -> BlockRequestStatus {
        match self {
            Self::Approve => BlockRequestStatus::Approved,
            Self::Reject => BlockRequestStatus::Rejected,
        }
    }

    /// Text returned to the caller once the decision is applied.
    #[must_use]
    pub const fn outcome(self) -> &'static str {
        match self {
            Self::Approve => "Approved",
            Self::Reject => "Rejected",
        }
    }
}

impl FromStr for BlockDecision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => Ok(Self::Approve),
            "REJECTED" => Ok(Self::Reject),
            _ => Err(Error::bad_request("Wrong answer")),
        }
    }
}

/// Whether a request for `card_id` in `status` exists.
pub async fn exists_by_card_and_status<C>(
    db: &C,
    card_id: i64,
    status: BlockRequestStatus,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = BlockRequest::find()
        .filter(block_request::Column::CardId.eq(card_id))
        .filter(block_request::Column::Status.eq(status))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Files a block request for one of the caller's cards.
///
/// # Errors
/// - `NotFound` when the card or the requesting user does not exist
/// - `Forbidden` when the card belongs to someone else
/// - `Conflict` when the card is already blocked or already has a pending request
#[instrument(skip(db, caller), fields(caller = caller.user_id))]
pub async fn create_block_request(
    db: &DatabaseConnection,
    caller: &Caller,
    card_id: i64,
) -> Result<BlockRequestView> {
    caller.require_role(Role::User)?;

    let txn = db.begin().await?;

    let card = require_card(&txn, card_id).await?;
    let user = require_user(&txn, caller.user_id).await?;
    caller.require_owner(card.owner_id)?;

    if card.status == CardStatus::Blocked {
        return Err(Error::conflict(format!(
            "Card with id {card_id} already blocked"
        )));
    }
    if exists_by_card_and_status(&txn, card_id, BlockRequestStatus::Pending).await? {
        return Err(Error::conflict("Pending request already exists"));
    }

    let request = block_request::ActiveModel {
        user_id: Set(user.id),
        card_id: Set(card.id),
        status: Set(BlockRequestStatus::Pending),
        created_at: Set(Utc::now()),
        processed_at: Set(None),
        processed_by: Set(None),
        pending_card_id: Set(Some(card.id)),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match Error::from(e) {
        // Lost the race against a concurrent request for the same card
        Error::Conflict { .. } => Error::conflict("Pending request already exists"),
        other => other,
    })?;

    txn.commit().await?;
    info!(request_id = request.id, card_id, "block request created");
    Ok(BlockRequestView::new(&request, &card))
}

/// Pages through block requests, newest first by default. Admin only.
pub async fn list_block_requests(
    db: &DatabaseConnection,
    caller: &Caller,
    filter: &BlockRequestFilter,
    page: PageRequest,
) -> Result<Page<BlockRequestView>> {
    caller.require_role(Role::Admin)?;
    page.validate()?;

    let paginator = BlockRequest::find()
        .find_also_related(Card)
        .filter(filter.condition())
        .order_by(block_request::Column::CreatedAt, page.order.into())
        .order_by(block_request::Column::Id, page.order.into())
        .paginate(db, page.size);
    let totals = paginator.num_items_and_pages().await?;
    let rows = paginator.fetch_page(page.page).await?;

    let mut items = Vec::with_capacity(rows.len());
    for (request, card) in rows {
        let card = card.ok_or_else(|| Error::card_not_found(request.card_id))?;
        items.push(BlockRequestView::new(&request, &card));
    }

    Ok(Page {
        items,
        page: page.page,
        size: page.size,
        total_items: totals.number_of_items,
        total_pages: totals.number_of_pages,
    })
}

/// Resolves a pending request. Admin only.
///
/// Approval blocks the card; rejection leaves it untouched. Either way the request
/// is stamped with the deciding admin and time and leaves the pending set, so a
/// second answer to the same id fails `NotFound`. Returns `"Approved"` or
/// `"Rejected"`.
///
/// # Errors
/// - `NotFound` when no pending request has this id or the admin does not exist
/// - `BadRequest` ("Wrong answer") for any answer other than APPROVED/REJECTED
#[instrument(skip(db, caller), fields(admin = caller.user_id))]
pub async fn answer_block_request(
    db: &DatabaseConnection,
    caller: &Caller,
    request_id: i64,
    answer: &str,
) -> Result<&'static str> {
    caller.require_role(Role::Admin)?;

    let txn = db.begin().await?;

    let request = BlockRequest::find_by_id(request_id)
        .filter(block_request::Column::Status.eq(BlockRequestStatus::Pending))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Request not found"))?;
    let admin = find_user_by_id(&txn, caller.user_id)
        .await?
        .ok_or_else(|| Error::not_found("Admin not found"))?;
    let decision: BlockDecision = answer.parse()?;

    let resolution = block_request::ActiveModel {
        status: Set(decision.status()),
        processed_by: Set(Some(admin.id)),
        processed_at: Set(Some(Utc::now())),
        pending_card_id: Set(None),
        ..Default::default()
    };
    let resolved = BlockRequest::update_many()
        .set(resolution)
        .filter(block_request::Column::Id.eq(request.id))
        .filter(block_request::Column::Status.eq(BlockRequestStatus::Pending))
        .exec(&txn)
        .await?;
    if resolved.rows_affected == 0 {
        return Err(Error::not_found("Request not found"));
    }

    if decision == BlockDecision::Approve {
        let card = require_card(&txn, request.card_id).await?;
        let mut active: card::ActiveModel = card.into();
        active.status = Set(CardStatus::Blocked);
        active.update(&txn).await?;
    }

    txn.commit().await?;
    info!(
        request_id,
        card_id = request.card_id,
        outcome = decision.outcome(),
        "block request answered"
    );
    Ok(decision.outcome())
}
