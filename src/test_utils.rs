//! Shared test utilities.
//!
//! Helpers for setting up an in-memory database and inserting users and cards
//! directly, bypassing the role checks of the admin operations.

use crate::{
    entities::{self, CardStatus, Role, UserStatus, card, user},
    errors::Result,
};
use chrono::{Days, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::path::Path;

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database under `dir`, for tests that need
/// several pooled connections at once.
pub async fn setup_file_db(dir: &Path) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("bank_cards.sqlite").display());
    let db = sea_orm::Database::connect(url).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Inserts a user with the given role.
pub async fn create_custom_user(
    db: &DatabaseConnection,
    name: &str,
    email: &str,
    role: Role,
) -> Result<entities::user::Model> {
    user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set("test-hash".to_string()),
        role: Set(role),
        status: Set(UserStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a cardholder (role `USER`).
pub async fn create_test_user(
    db: &DatabaseConnection,
    name: &str,
    email: &str,
) -> Result<entities::user::Model> {
    create_custom_user(db, name, email, Role::User).await
}

/// Inserts a card with an arbitrary status and balance, expiring in a year.
pub async fn create_custom_card(
    db: &DatabaseConnection,
    owner_id: i64,
    number: &str,
    balance: i64,
    status: CardStatus,
) -> Result<entities::card::Model> {
    card::ActiveModel {
        number: Set(number.to_string()),
        expiry_date: Set(Utc::now().date_naive() + Days::new(365)),
        status: Set(status),
        balance: Set(balance),
        owner_id: Set(owner_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts an active card with the given balance.
pub async fn create_test_card(
    db: &DatabaseConnection,
    owner_id: i64,
    number: &str,
    balance: i64,
) -> Result<entities::card::Model> {
    create_custom_card(db, owner_id, number, balance, CardStatus::Active).await
}

/// Sets up a database with one administrator.
/// Returns (db, admin) for admin-side scenarios.
pub async fn setup_with_admin() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let admin = create_custom_user(&db, "Admin", "admin@bank.test", Role::Admin).await?;
    Ok((db, admin))
}

/// Sets up a database with one cardholder.
pub async fn setup_with_cardholder() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, "Alice", "alice@bank.test").await?;
    Ok((db, user))
}
