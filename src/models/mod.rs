pub mod catalog_item;
pub mod ledger_entry;
pub mod order;
pub mod ownership;
pub mod wallet;

pub use catalog_item::CatalogItem;
pub use ledger_entry::{EntryKind, LedgerEntry};
pub use order::{Order, OrderStatus, OrderTransition};
pub use ownership::OwnershipRecord;
pub use wallet::{Wallet, MAX_SAFE_BALANCE};
