//! Transfer engine - moves funds between two cards of the same owner.
//!
//! Every attempt whose cards can be found leaves exactly one row in `transactions`:
//! `COMPLETED` on success, `CANCELLED` when the cards belong to different owners,
//! `FAILED` when the source lacks funds or the destination would overflow. The
//! audit row is committed before the error is returned.
//!
//! Balances move through guarded single-statement updates
//! (`balance = balance - amount WHERE balance >= amount`) inside the same database
//! transaction as the audit row, so concurrent transfers from one card cannot lose
//! an update or drive the balance negative.

use crate::{
    core::{
        caller::Caller,
        card::{find_card_by_id, require_card},
    },
    entities::{Card, Role, Transaction, TransactionStatus, card, transaction},
    errors::{Error, Result},
    views::TransactionView,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// A transfer attempt whose outcome is not decided yet.
///
/// It is consumed by [`ProvisionalTransaction::finalize`], so the status is set
/// exactly once and only right before the row is written.
#[derive(Debug, Clone, Copy)]
struct ProvisionalTransaction {
    from_card_id: i64,
    to_card_id: i64,
    amount: i64,
    timestamp: DateTime<Utc>,
}

impl ProvisionalTransaction {
    fn new(from: &card::Model, to: &card::Model, amount: i64) -> Self {
        Self {
            from_card_id: from.id,
            to_card_id: to.id,
            amount,
            timestamp: Utc::now(),
        }
    }

    async fn finalize(
        self,
        txn: &DatabaseTransaction,
        status: TransactionStatus,
    ) -> Result<transaction::Model> {
        debug_assert_ne!(status, TransactionStatus::Pending);
        transaction::ActiveModel {
            from_card_id: Set(self.from_card_id),
            to_card_id: Set(self.to_card_id),
            amount: Set(self.amount),
            timestamp: Set(self.timestamp),
            status: Set(status),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(Into::into)
    }
}

/// Why the balance updates did not go through.
enum MoveRejected {
    InsufficientFunds,
    Overflow,
}

/// Debits `from` and credits `to` inside a savepoint. On a guard miss the savepoint
/// is rolled back and nothing has moved.
async fn move_funds(
    txn: &DatabaseTransaction,
    from_card_id: i64,
    to_card_id: i64,
    amount: i64,
) -> Result<std::result::Result<(), MoveRejected>> {
    let savepoint = txn.begin().await?;

    let debited = Card::update_many()
        .col_expr(
            card::Column::Balance,
            Expr::col(card::Column::Balance).sub(amount),
        )
        .filter(card::Column::Id.eq(from_card_id))
        .filter(card::Column::Balance.gte(amount))
        .exec(&savepoint)
        .await?;
    if debited.rows_affected == 0 {
        savepoint.rollback().await?;
        return Ok(Err(MoveRejected::InsufficientFunds));
    }

    let credited = Card::update_many()
        .col_expr(
            card::Column::Balance,
            Expr::col(card::Column::Balance).add(amount),
        )
        .filter(card::Column::Id.eq(to_card_id))
        .filter(card::Column::Balance.lte(i64::MAX - amount))
        .exec(&savepoint)
        .await?;
    if credited.rows_affected == 0 {
        savepoint.rollback().await?;
        return Ok(Err(MoveRejected::Overflow));
    }

    savepoint.commit().await?;
    Ok(Ok(()))
}

/// Transfers `amount` minor units from one of the caller's cards to another card
/// of the same owner.
///
/// Validation runs in a fixed order and stops at the first failure:
/// 1. `amount` must be positive (`InvalidAmount`, nothing recorded)
/// 2. both cards must exist (`NotFound` naming the id, nothing recorded)
/// 3. the caller must own the source card (`Forbidden`, nothing recorded)
/// 4. both cards must share an owner (`OwnershipMismatch`, `CANCELLED` recorded)
/// 5. the source must cover the amount (`InsufficientFunds`, `FAILED` recorded)
/// 6. the destination must not overflow (`BalanceOverflow`, `FAILED` recorded)
#[instrument(skip(db, caller), fields(caller = caller.user_id))]
pub async fn transfer(
    db: &DatabaseConnection,
    caller: &Caller,
    from_card_id: i64,
    to_card_id: i64,
    amount: i64,
) -> Result<TransactionView> {
    caller.require_role(Role::User)?;
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let from_card = require_card(&txn, from_card_id).await?;
    let to_card = require_card(&txn, to_card_id).await?;
    caller.require_owner(from_card.owner_id)?;

    let provisional = ProvisionalTransaction::new(&from_card, &to_card, amount);

    if from_card.owner_id != to_card.owner_id {
        let record = provisional
            .finalize(&txn, TransactionStatus::Cancelled)
            .await?;
        txn.commit().await?;
        warn!(transaction_id = record.id, "transfer cancelled: cards have different owners");
        return Err(Error::OwnershipMismatch {
            transaction_id: record.id,
        });
    }

    if from_card.balance < amount {
        let record = provisional.finalize(&txn, TransactionStatus::Failed).await?;
        txn.commit().await?;
        warn!(transaction_id = record.id, "transfer failed: insufficient funds");
        return Err(Error::InsufficientFunds {
            transaction_id: record.id,
            balance: from_card.balance,
            required: amount,
        });
    }

    match move_funds(&txn, from_card.id, to_card.id, amount).await? {
        Ok(()) => {}
        Err(MoveRejected::InsufficientFunds) => {
            // Another transfer drained the card after it was read
            let balance = find_card_by_id(&txn, from_card.id)
                .await?
                .map_or(0, |card| card.balance);
            let record = provisional.finalize(&txn, TransactionStatus::Failed).await?;
            txn.commit().await?;
            warn!(transaction_id = record.id, "transfer failed: insufficient funds");
            return Err(Error::InsufficientFunds {
                transaction_id: record.id,
                balance,
                required: amount,
            });
        }
        Err(MoveRejected::Overflow) => {
            let record = provisional.finalize(&txn, TransactionStatus::Failed).await?;
            txn.commit().await?;
            warn!(transaction_id = record.id, "transfer failed: destination balance overflow");
            return Err(Error::BalanceOverflow {
                transaction_id: record.id,
            });
        }
    }

    let record = provisional
        .finalize(&txn, TransactionStatus::Completed)
        .await?;
    txn.commit().await?;

    info!(transaction_id = record.id, amount, "transfer completed");
    Ok(TransactionView::new(&record, &from_card, &to_card))
}

/// Transfer history of a card, newest first. Cardholders may only read their own
/// cards.
#[instrument(skip(db))]
pub async fn get_transactions_for_card(
    db: &DatabaseConnection,
    caller: &Caller,
    card_id: i64,
) -> Result<Vec<TransactionView>> {
    let card = require_card(db, card_id).await?;
    if !caller.is_admin() {
        caller.require_owner(card.owner_id)?;
    }

    let records = Transaction::find()
        .filter(
            Condition::any()
                .add(transaction::Column::FromCardId.eq(card_id))
                .add(transaction::Column::ToCardId.eq(card_id)),
        )
        .order_by_desc(transaction::Column::Timestamp)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await?;

    let mut card_ids: Vec<i64> = records
        .iter()
        .flat_map(|t| [t.from_card_id, t.to_card_id])
        .collect();
    card_ids.sort_unstable();
    card_ids.dedup();

    let cards: HashMap<i64, card::Model> = Card::find()
        .filter(card::Column::Id.is_in(card_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|card| (card.id, card))
        .collect();

    records
        .iter()
        .map(|record| {
            let from = cards
                .get(&record.from_card_id)
                .ok_or_else(|| Error::card_not_found(record.from_card_id))?;
            let to = cards
                .get(&record.to_card_id)
                .ok_or_else(|| Error::card_not_found(record.to_card_id))?;
            Ok(TransactionView::new(record, from, to))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase, PaginatorTrait};

    async fn all_transactions(db: &DatabaseConnection) -> Result<Vec<transaction::Model>> {
        Transaction::find()
            .order_by_asc(transaction::Column::Id)
            .all(db)
            .await
            .map_err(Into::into)
    }

    async fn balance_of(db: &DatabaseConnection, card_id: i64) -> Result<i64> {
        Ok(require_card(db, card_id).await?.balance)
    }

    #[tokio::test]
    async fn test_transfer_rejects_non_positive_amount() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let caller = Caller::user(1);

        for amount in [0, -1, i64::MIN] {
            let result = transfer(&db, &caller, 1, 2, amount).await;
            assert!(matches!(result, Err(Error::InvalidAmount { amount: a }) if a == amount));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_requires_user_role() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = transfer(&db, &Caller::admin(1), 1, 2, 10).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_between_own_cards() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 1000).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 0).await?;

        let view = transfer(&db, &Caller::user(alice.id), a.id, b.id, 400).await?;

        assert_eq!(view.amount, 400);
        assert_eq!(view.status, TransactionStatus::Completed);
        assert_eq!(view.from_card_number, "**** **** **** 1111");
        assert_eq!(view.to_card_number, "**** **** **** 2222");
        assert_eq!(balance_of(&db, a.id).await?, 600);
        assert_eq!(balance_of(&db, b.id).await?, 400);

        let records = all_transactions(&db).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Completed);
        assert_eq!(records[0].amount, 400);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_of_entire_balance() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 250).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 50).await?;

        transfer(&db, &Caller::user(alice.id), a.id, b.id, 250).await?;
        assert_eq!(balance_of(&db, a.id).await?, 0);
        assert_eq!(balance_of(&db, b.id).await?, 300);
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_to_foreign_card_is_cancelled() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let bob = create_test_user(&db, "Bob", "bob@bank.test").await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 100).await?;
        let b = create_test_card(&db, bob.id, "4000000000002222", 0).await?;

        let err = transfer(&db, &Caller::user(alice.id), a.id, b.id, 50)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transfer allowed only between own cards");
        assert_eq!(err.kind(), ErrorKind::DomainFailure);

        let records = all_transactions(&db).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Cancelled);
        assert_eq!(err.audit_transaction_id(), Some(records[0].id));
        assert_eq!(balance_of(&db, a.id).await?, 100);
        assert_eq!(balance_of(&db, b.id).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_ownership_checked_before_balance() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let bob = create_test_user(&db, "Bob", "bob@bank.test").await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 10).await?;
        let b = create_test_card(&db, bob.id, "4000000000002222", 0).await?;

        let err = transfer(&db, &Caller::user(alice.id), a.id, b.id, 500)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OwnershipMismatch { .. }));
        assert_eq!(
            all_transactions(&db).await?[0].status,
            TransactionStatus::Cancelled
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_is_failed() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 100).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 5).await?;

        let err = transfer(&db, &Caller::user(alice.id), a.id, b.id, 101)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                balance: 100,
                required: 101,
                ..
            }
        ));

        let records = all_transactions(&db).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Failed);
        assert_eq!(balance_of(&db, a.id).await?, 100);
        assert_eq!(balance_of(&db, b.id).await?, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_overflow_is_failed() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 10).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", i64::MAX - 5).await?;

        let err = transfer(&db, &Caller::user(alice.id), a.id, b.id, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BalanceOverflow { .. }));

        let records = all_transactions(&db).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Failed);
        assert_eq!(balance_of(&db, a.id).await?, 10);
        assert_eq!(balance_of(&db, b.id).await?, i64::MAX - 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_missing_card_records_nothing() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 100).await?;

        let err = transfer(&db, &Caller::user(alice.id), a.id, 404, 10)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Card with id 404 not found");

        let err = transfer(&db, &Caller::user(alice.id), 405, a.id, 10)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Card with id 405 not found");

        assert_eq!(Transaction::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_from_someone_elses_card_is_forbidden() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let mallory = create_test_user(&db, "Mallory", "mallory@bank.test").await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 100).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 0).await?;

        let result = transfer(&db, &Caller::user(mallory.id), a.id, b.id, 10).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        assert_eq!(Transaction::find().count(&db).await?, 0);
        assert_eq!(balance_of(&db, a.id).await?, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_sequential_transfers_never_overdraw() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 1000).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 0).await?;
        let caller = Caller::user(alice.id);

        transfer(&db, &caller, a.id, b.id, 600).await?;
        let second = transfer(&db, &caller, a.id, b.id, 600).await;
        assert!(matches!(second, Err(Error::InsufficientFunds { .. })));

        assert_eq!(balance_of(&db, a.id).await?, 400);
        assert_eq!(balance_of(&db, b.id).await?, 600);

        let statuses: Vec<_> = all_transactions(&db)
            .await?
            .into_iter()
            .map(|t| t.status)
            .collect();
        assert_eq!(
            statuses,
            vec![TransactionStatus::Completed, TransactionStatus::Failed]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_transfers_never_overdraw() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_file_db(dir.path()).await?;
        let alice = create_test_user(&db, "Alice", "alice@bank.test").await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 1000).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 0).await?;
        let caller = Caller::user(alice.id);

        let results = tokio::join!(
            transfer(&db, &caller, a.id, b.id, 300),
            transfer(&db, &caller, a.id, b.id, 300),
            transfer(&db, &caller, a.id, b.id, 300),
            transfer(&db, &caller, a.id, b.id, 300),
        );
        for result in [results.0, results.1, results.2, results.3] {
            assert!(matches!(
                result,
                Ok(_) | Err(Error::InsufficientFunds { .. })
            ));
        }

        let records = all_transactions(&db).await?;
        assert_eq!(records.len(), 4);
        let completed = records
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .count();
        let failed = records
            .iter()
            .filter(|t| t.status == TransactionStatus::Failed)
            .count();
        assert_eq!(completed + failed, 4);

        let debited = 300 * i64::try_from(completed).unwrap();
        assert!(debited <= 1000);
        assert_eq!(completed, 3);
        assert_eq!(balance_of(&db, a.id).await?, 1000 - debited);
        assert_eq!(balance_of(&db, b.id).await?, debited);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_transactions_for_card() -> Result<()> {
        let (db, alice) = setup_with_cardholder().await?;
        let bob = create_test_user(&db, "Bob", "bob@bank.test").await?;
        let a = create_test_card(&db, alice.id, "4000000000001111", 1000).await?;
        let b = create_test_card(&db, alice.id, "4000000000002222", 0).await?;
        let caller = Caller::user(alice.id);

        transfer(&db, &caller, a.id, b.id, 100).await?;
        let _ = transfer(&db, &caller, a.id, b.id, 5000).await;
        transfer(&db, &caller, b.id, a.id, 30).await?;

        let history = get_transactions_for_card(&db, &caller, a.id).await?;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].amount, 30);
        assert_eq!(history[0].from_card_number, "**** **** **** 2222");
        assert_eq!(history[1].status, TransactionStatus::Failed);

        let foreign = get_transactions_for_card(&db, &Caller::user(bob.id), a.id).await;
        assert!(matches!(foreign, Err(Error::Forbidden { .. })));

        Ok(())
    }
}
