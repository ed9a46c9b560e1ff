//! Entity module - Contains all SeaORM entity definitions for the database.
//! Relationships are expressed through foreign-key columns only; there are no
//! back-pointers between models.

pub mod block_request;
pub mod card;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use block_request::{
    BlockRequestStatus, Column as BlockRequestColumn, Entity as BlockRequest,
    Model as BlockRequestModel,
};
pub use card::{CardStatus, Column as CardColumn, Entity as Card, Model as CardModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionStatus,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role, UserStatus};
