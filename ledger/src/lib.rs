//! sp-payment Ledger
//!
//! Account, transaction, settlement and profile records, the repository contract with
//! PostgreSQL and in-memory implementations, and the engine that moves balances.

pub mod account;
pub mod balance;
pub mod engine;
pub mod memory;
pub mod postgres;
pub mod profile;
pub mod reconciler;
pub mod report;
pub mod repository;
pub mod settlement;
pub mod transaction;

pub use account::{
    Account, AccountFilter, AccountQuery, AccountUpdate, CreateAccountOutcome, NewAccount,
    OwnerName, SealedNumber,
};
pub use balance::BalanceDelta;
pub use engine::{LedgerEngine, TransferRequest};
pub use memory::InMemoryRepository;
pub use postgres::PgRepository;
pub use profile::{Customer, Merchant, ProfileFilter, ProfileKey};
pub use reconciler::SettlementReconciler;
pub use report::{AdminReport, CustomerReport, MerchantReport, MonthlyNominal, ReportWindow, Tally};
pub use repository::{
    AccountRepository, BeneficiaryRepository, CustomerRepository, MerchantRepository,
    ReportRepository, Repository, SettlementRepository, TransactionRepository,
};
pub use settlement::{Beneficiary, BeneficiaryFilter, PayoutRequest, Settlement, SettlementFilter};
pub use transaction::{NewSettlement, NewTransaction, Transaction, TransactionFilter};
