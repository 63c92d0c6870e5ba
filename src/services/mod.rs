pub mod catalog;
pub mod settlement;
pub mod wallet_ledger;

pub use catalog::{Catalog, InMemoryCatalog, PgCatalog};
pub use settlement::{SettlementCoordinator, SettlementOutcome, SettlementResult};
pub use wallet_ledger::{
    GrantOwnership, LedgerLimits, LedgerReceipt, PurchaseReceipt, ReconciliationReport,
    UnitOfWork, WalletLedger,
};
