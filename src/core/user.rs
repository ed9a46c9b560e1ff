//! User business logic - administrator-side user management and seeding.
//!
//! Credentials are opaque here: the password hash arrives already computed and is
//! stored as-is.

use crate::{
    config::seed::UserSeed,
    core::{
        caller::Caller,
        filter::{Page, PageRequest},
    },
    entities::{Card, Role, User, UserStatus, card, user},
    errors::{Error, Result},
    views::UserView,
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Input for [`create_user`].
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Input for [`update_user`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub status: Option<UserStatus>,
}

fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(Error::bad_request(format!("Invalid email address: {email}"))),
    }
}

/// Looks up a user by id.
pub async fn find_user_by_id<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Looks up a user by id, failing with `NotFound` when absent.
pub async fn require_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    find_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::user_not_found(user_id))
}

async fn email_taken<C>(db: &C, email: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = User::find()
        .filter(user::Column::Email.eq(email))
        .count(db)
        .await?;
    Ok(count > 0)
}

async fn insert_user<C>(db: &C, request: UserCreate) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let user = user::ActiveModel {
        name: Set(request.name.trim().to_string()),
        email: Set(request.email.trim().to_string()),
        password_hash: Set(request.password_hash),
        role: Set(request.role),
        status: Set(UserStatus::Active),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    user.insert(db).await.map_err(Into::into)
}

/// Creates a user. Admin only.
///
/// # Errors
/// - `BadRequest` for a blank name or malformed email
/// - `Conflict` when the email is already registered
#[instrument(skip(db, request), fields(email = %request.email))]
pub async fn create_user(
    db: &DatabaseConnection,
    caller: &Caller,
    request: UserCreate,
) -> Result<UserView> {
    caller.require_role(Role::Admin)?;

    if request.name.trim().is_empty() {
        return Err(Error::bad_request("User name cannot be empty"));
    }
    validate_email(&request.email)?;

    if email_taken(db, request.email.trim()).await? {
        return Err(Error::conflict("User with this email already exists"));
    }

    let user = insert_user(db, request).await?;
    info!(user_id = user.id, "user created");
    Ok(UserView::from(&user))
}

/// Fetches one user. Admin only.
pub async fn get_user(db: &DatabaseConnection, caller: &Caller, user_id: i64) -> Result<UserView> {
    caller.require_role(Role::Admin)?;
    let user = require_user(db, user_id).await?;
    Ok(UserView::from(&user))
}

/// Lists users ordered by id. Admin only.
pub async fn list_users(
    db: &DatabaseConnection,
    caller: &Caller,
    page: PageRequest,
) -> Result<Page<UserView>> {
    caller.require_role(Role::Admin)?;
    page.validate()?;

    let paginator = User::find()
        .order_by(user::Column::Id, page.order.into())
        .paginate(db, page.size);
    let totals = paginator.num_items_and_pages().await?;
    let users = paginator.fetch_page(page.page).await?;

    Ok(Page {
        items: users.iter().map(UserView::from).collect(),
        page: page.page,
        size: page.size,
        total_items: totals.number_of_items,
        total_pages: totals.number_of_pages,
    })
}

/// Updates email, password hash or status. Admin only.
#[instrument(skip(db, update))]
pub async fn update_user(
    db: &DatabaseConnection,
    caller: &Caller,
    user_id: i64,
    update: UserUpdate,
) -> Result<UserView> {
    caller.require_role(Role::Admin)?;
    let existing = require_user(db, user_id).await?;

    let mut active: user::ActiveModel = existing.clone().into();
    if let Some(email) = update.email {
        validate_email(&email)?;
        let email = email.trim().to_string();
        if email != existing.email && email_taken(db, &email).await? {
            return Err(Error::conflict("User with this email already exists"));
        }
        active.email = Set(email);
    }
    if let Some(password_hash) = update.password_hash {
        active.password_hash = Set(password_hash);
    }
    if let Some(status) = update.status {
        active.status = Set(status);
    }

    let user = active.update(db).await?;
    info!(user_id, "user updated");
    Ok(UserView::from(&user))
}

/// Deletes a user that owns no cards. Admin only.
///
/// # Errors
/// - `NotFound` when the user does not exist
/// - `Conflict` while the user still owns cards
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, caller: &Caller, user_id: i64) -> Result<()> {
    caller.require_role(Role::Admin)?;

    let txn = db.begin().await?;
    let user = require_user(&txn, user_id).await?;

    let owned_cards = Card::find()
        .filter(card::Column::OwnerId.eq(user_id))
        .count(&txn)
        .await?;
    if owned_cards > 0 {
        return Err(Error::conflict(format!(
            "User with id {user_id} still owns {owned_cards} card(s)"
        )));
    }

    user.delete(&txn).await?;
    txn.commit().await?;
    info!(user_id, "user deleted");
    Ok(())
}

/// Inserts every seed whose email is not registered yet. Returns how many were added.
#[instrument(skip_all, fields(seeds = seeds.len()))]
pub async fn seed_users(db: &DatabaseConnection, seeds: &[UserSeed]) -> Result<usize> {
    let txn = db.begin().await?;
    let mut created = 0;

    for seed in seeds {
        if email_taken(&txn, seed.email.trim()).await? {
            tracing::debug!(email = %seed.email, "seed user already exists, skipping");
            continue;
        }
        validate_email(&seed.email)?;
        insert_user(
            &txn,
            UserCreate {
                name: seed.name.clone(),
                email: seed.email.clone(),
                password_hash: seed.password_hash.clone(),
                role: seed.role,
            },
        )
        .await?;
        created += 1;
    }

    txn.commit().await?;
    info!(created, "seeded users");
    Ok(created)
}
