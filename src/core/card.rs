//! Card business logic - the card store and administrator card management.
//!
//! The lookups here (`find_card_by_id`, `require_card`, `exists_by_number`) are
//! generic over `ConnectionTrait` so the transfer and block workflows can run them
//! inside their own database transaction.

use crate::{
    core::{
        caller::Caller,
        filter::{CardFilter, Page, PageRequest},
        user::require_user,
    },
    entities::{
        BlockRequest, Card, CardStatus, Role, Transaction, User, block_request, card,
        transaction,
    },
    errors::{Error, Result},
    views::CardView,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

const PAN_LENGTH: usize = 16;

/// Input for [`create_card`].
#[derive(Debug, Clone)]
pub struct CardCreate {
    pub owner_id: i64,
    /// 16 digits, optionally grouped with spaces
    pub number: String,
    pub expiry_date: NaiveDate,
}

/// Input for [`update_card`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub expiry_date: Option<NaiveDate>,
    pub status: Option<CardStatus>,
}

/// Strips group separators and checks the PAN is exactly 16 digits.
pub fn normalize_card_number(number: &str) -> Result<String> {
    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != PAN_LENGTH || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::bad_request(format!(
            "Card number must consist of {PAN_LENGTH} digits"
        )));
    }
    Ok(digits)
}

fn validate_expiry(expiry_date: NaiveDate) -> Result<()> {
    if expiry_date <= Utc::now().date_naive() {
        return Err(Error::bad_request("Expiry date must be in the future"));
    }
    Ok(())
}

pub async fn find_card_by_id<C>(db: &C, card_id: i64) -> Result<Option<card::Model>>
where
    C: ConnectionTrait,
{
    Card::find_by_id(card_id).one(db).await.map_err(Into::into)
}

/// Looks up a card, failing with `NotFound` naming the id.
pub async fn require_card<C>(db: &C, card_id: i64) -> Result<card::Model>
where
    C: ConnectionTrait,
{
    find_card_by_id(db, card_id)
        .await?
        .ok_or_else(|| Error::card_not_found(card_id))
}

pub async fn exists_by_number<C>(db: &C, number: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = Card::find()
        .filter(card::Column::Number.eq(number))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Loads a card together with its owner.
async fn require_card_with_owner<C>(db: &C, card_id: i64) -> Result<CardView>
where
    C: ConnectionTrait,
{
    let card = require_card(db, card_id).await?;
    let owner = require_user(db, card.owner_id).await?;
    Ok(CardView::new(&card, &owner))
}

/// Pages through cards matching `condition`, newest expiry first by default.
pub async fn find_filtered(
    db: &DatabaseConnection,
    condition: Condition,
    page: PageRequest,
) -> Result<Page<CardView>> {
    page.validate()?;

    let paginator = Card::find()
        .find_also_related(User)
        .filter(condition)
        .order_by(card::Column::ExpiryDate, page.order.into())
        .order_by_asc(card::Column::Id)
        .paginate(db, page.size);
    let totals = paginator.num_items_and_pages().await?;
    let rows = paginator.fetch_page(page.page).await?;

    let mut items = Vec::with_capacity(rows.len());
    for (card, owner) in rows {
        let owner = owner.ok_or_else(|| Error::user_not_found(card.owner_id))?;
        items.push(CardView::new(&card, &owner));
    }

    Ok(Page {
        items,
        page: page.page,
        size: page.size,
        total_items: totals.number_of_items,
        total_pages: totals.number_of_pages,
    })
}

/// Issues a new active card with zero balance. Admin only.
///
/// # Errors
/// - `BadRequest` for a malformed number or an expiry date not in the future
/// - `NotFound` when the owner does not exist
/// - `Conflict` when the number is already issued
#[instrument(skip(db, request), fields(owner_id = request.owner_id))]
pub async fn create_card(
    db: &DatabaseConnection,
    caller: &Caller,
    request: CardCreate,
) -> Result<CardView> {
    caller.require_role(Role::Admin)?;

    let number = normalize_card_number(&request.number)?;
    validate_expiry(request.expiry_date)?;

    let owner = require_user(db, request.owner_id).await?;
    if exists_by_number(db, &number).await? {
        return Err(Error::conflict("Card number already exists"));
    }

    let card = card::ActiveModel {
        number: Set(number),
        expiry_date: Set(request.expiry_date),
        status: Set(CardStatus::Active),
        balance: Set(0),
        owner_id: Set(owner.id),
        ..Default::default()
    };
    let card = card.insert(db).await?;

    info!(card_id = card.id, "card issued");
    Ok(CardView::new(&card, &owner))
}

/// Fetches one card. Admin only.
#[instrument(skip(db))]
pub async fn get_card(db: &DatabaseConnection, caller: &Caller, card_id: i64) -> Result<CardView> {
    caller.require_role(Role::Admin)?;
    require_card_with_owner(db, card_id).await
}

/// Lists cards. Administrators see every card, cardholders only their own
/// regardless of the owner in `filter`.
#[instrument(skip(db, filter, page))]
pub async fn list_cards(
    db: &DatabaseConnection,
    caller: &Caller,
    mut filter: CardFilter,
    page: PageRequest,
) -> Result<Page<CardView>> {
    if !caller.is_admin() {
        filter.owner_id = Some(caller.user_id);
    }
    find_filtered(db, filter.condition(), page).await
}

/// Changes expiry date and/or status. Admin only.
///
/// Blocking is not possible here: a card only becomes `BLOCKED` through an
/// approved block request, and a blocked card keeps that status.
#[instrument(skip(db, update))]
pub async fn update_card(
    db: &DatabaseConnection,
    caller: &Caller,
    card_id: i64,
    update: CardUpdate,
) -> Result<CardView> {
    caller.require_role(Role::Admin)?;

    if let Some(expiry_date) = update.expiry_date {
        validate_expiry(expiry_date)?;
    }
    if update.status == Some(CardStatus::Blocked) {
        return Err(Error::bad_request(
            "Cards are blocked only through an approved block request",
        ));
    }

    let card = require_card(db, card_id).await?;
    if card.status == CardStatus::Blocked && update.status.is_some() {
        return Err(Error::conflict(format!(
            "Card with id {card_id} is blocked and cannot change status"
        )));
    }
    let mut active: card::ActiveModel = card.into();
    if let Some(expiry_date) = update.expiry_date {
        active.expiry_date = Set(expiry_date);
    }
    if let Some(status) = update.status {
        active.status = Set(status);
    }
    let card = active.update(db).await?;

    let owner = require_user(db, card.owner_id).await?;
    info!(card_id, "card updated");
    Ok(CardView::new(&card, &owner))
}

/// Deletes a card along with its transfer history and block requests. Admin only.
#[instrument(skip(db))]
pub async fn delete_card(db: &DatabaseConnection, caller: &Caller, card_id: i64) -> Result<()> {
    caller.require_role(Role::Admin)?;

    let txn = db.begin().await?;
    let card = require_card(&txn, card_id).await?;

    Transaction::delete_many()
        .filter(
            Condition::any()
                .add(transaction::Column::FromCardId.eq(card_id))
                .add(transaction::Column::ToCardId.eq(card_id)),
        )
        .exec(&txn)
        .await?;
    BlockRequest::delete_many()
        .filter(block_request::Column::CardId.eq(card_id))
        .exec(&txn)
        .await?;
    card.delete(&txn).await?;

    txn.commit().await?;
    info!(card_id, "card deleted");
    Ok(())
}

/// Returns the balance of one of the caller's own cards.
#[instrument(skip(db))]
pub async fn get_card_balance(
    db: &DatabaseConnection,
    caller: &Caller,
    card_id: i64,
) -> Result<i64> {
    caller.require_role(Role::User)?;
    let card = require_card(db, card_id).await?;
    caller.require_owner(card.owner_id)?;
    Ok(card.balance)
}
