//! The persistence contract.
//!
//! Every method is one unit of work. The `create_transaction_*` methods and
//! `create_beneficiary` are atomic: they either apply every balance move and record, or
//! nothing.

use async_trait::async_trait;
use rust_decimal::Decimal;

use sp_payment_common::{
    AccountId, BeneficiaryId, CustomerId, MerchantId, Pagination, Result, SettlementId,
    TransactionId, TransactionStatus,
};

use crate::account::{
    Account, AccountFilter, AccountQuery, AccountUpdate, CreateAccountOutcome, NewAccount,
};
use crate::profile::{Customer, Merchant, ProfileFilter, ProfileKey};
use crate::report::{AdminReport, CustomerReport, MerchantReport, ReportWindow};
use crate::settlement::{
    Beneficiary, BeneficiaryFilter, PayoutRequest, Settlement, SettlementFilter,
};
use crate::transaction::{NewSettlement, NewTransaction, Transaction, TransactionFilter};

/// Accounts table.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find one live account.
    async fn find_account(&self, query: &AccountQuery) -> Result<Option<Account>>;

    /// List live accounts.
    async fn find_accounts(&self, filter: &AccountFilter, page: Pagination) -> Result<Vec<Account>>;

    /// Count live accounts.
    async fn count_accounts(&self, filter: &AccountFilter) -> Result<u64>;

    /// Insert an account. An owner that already holds a live account is
    /// `DuplicatedResource`; a taken number hash is reported, not raised.
    async fn create_account(&self, account: &NewAccount) -> Result<CreateAccountOutcome>;

    /// Update mutable fields. `NotFound` when no live row matches.
    async fn update_account(&self, update: &AccountUpdate) -> Result<()>;

    /// Tombstone an account.
    async fn delete_account(&self, id: AccountId) -> Result<()>;
}

/// Transactions table and the balance moves that accompany each kind.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// List live transactions, newest first.
    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>>;

    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<u64>;

    /// Debit the sender by nominal plus fee, credit the recipient by nominal, write the
    /// record.
    async fn create_transaction_p2p(&self, trx: &NewTransaction) -> Result<Transaction>;

    /// Debit the sender by nominal plus fee, write the record and its pending settlement.
    async fn create_transaction_p2b(
        &self,
        trx: &NewTransaction,
        settlement: &NewSettlement,
    ) -> Result<(Transaction, Settlement)>;

    /// Credit the recipient by nominal and write the record.
    async fn create_transaction_system(&self, trx: &NewTransaction) -> Result<Transaction>;

    /// Change the status only. `NotFound` when no live row matches.
    async fn update_transaction(&self, id: TransactionId, status: TransactionStatus) -> Result<()>;

    /// Tombstone a transaction. Balances are left untouched.
    async fn delete_transaction(&self, id: TransactionId) -> Result<()>;
}

/// Settlements table.
#[async_trait]
pub trait SettlementRepository: Send + Sync {
    async fn find_settlement(&self, id: SettlementId) -> Result<Option<Settlement>>;

    async fn find_settlements(
        &self,
        filter: &SettlementFilter,
        page: Pagination,
    ) -> Result<Vec<Settlement>>;

    async fn count_settlements(&self, filter: &SettlementFilter) -> Result<u64>;

    /// Sum of the merchant's settlements not yet claimed by a payout.
    async fn find_pending_settlement(&self, merchant_id: MerchantId) -> Result<Decimal>;
}

/// Beneficiaries table.
#[async_trait]
pub trait BeneficiaryRepository: Send + Sync {
    async fn find_beneficiary(&self, id: BeneficiaryId) -> Result<Option<Beneficiary>>;

    async fn find_beneficiaries(
        &self,
        filter: &BeneficiaryFilter,
        page: Pagination,
    ) -> Result<Vec<Beneficiary>>;

    async fn count_beneficiaries(&self, filter: &BeneficiaryFilter) -> Result<u64>;

    /// Pay out every pending settlement of the merchant in one unit: insert the
    /// beneficiary, claim the settlements (at least one, else `BadRequest`), debit the
    /// merchant account and record the merchant-system transaction.
    async fn create_beneficiary(&self, payout: &PayoutRequest) -> Result<Beneficiary>;
}

/// Customers table.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_customer(&self, key: &ProfileKey<CustomerId>) -> Result<Option<Customer>>;

    async fn find_customers(
        &self,
        filter: &ProfileFilter,
        page: Pagination,
    ) -> Result<Vec<Customer>>;

    async fn count_customers(&self, filter: &ProfileFilter) -> Result<u64>;

    /// Insert a profile. A live profile for the same user is `DuplicatedResource`.
    async fn create_customer(&self, customer: &Customer) -> Result<()>;

    /// Replace every mutable field. `NotFound` when no live row matches.
    async fn update_customer(&self, customer: &Customer) -> Result<()>;

    async fn delete_customer(&self, key: &ProfileKey<CustomerId>) -> Result<()>;
}

/// Merchants table.
#[async_trait]
pub trait MerchantRepository: Send + Sync {
    async fn find_merchant(&self, key: &ProfileKey<MerchantId>) -> Result<Option<Merchant>>;

    async fn find_merchants(
        &self,
        filter: &ProfileFilter,
        page: Pagination,
    ) -> Result<Vec<Merchant>>;

    async fn count_merchants(&self, filter: &ProfileFilter) -> Result<u64>;

    /// Insert a profile. A live profile for the same user is `DuplicatedResource`.
    async fn create_merchant(&self, merchant: &Merchant) -> Result<()>;

    /// Replace every mutable field. `NotFound` when no live row matches.
    async fn update_merchant(&self, merchant: &Merchant) -> Result<()>;

    async fn delete_merchant(&self, key: &ProfileKey<MerchantId>) -> Result<()>;
}

/// Dashboard aggregates.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn admin_report(&self, window: ReportWindow) -> Result<AdminReport>;

    async fn merchant_report(
        &self,
        account_id: AccountId,
        merchant_id: MerchantId,
        window: ReportWindow,
    ) -> Result<MerchantReport>;

    async fn customer_report(
        &self,
        account_id: AccountId,
        window: ReportWindow,
    ) -> Result<CustomerReport>;
}

/// The whole persistence boundary.
pub trait Repository:
    AccountRepository
    + TransactionRepository
    + SettlementRepository
    + BeneficiaryRepository
    + CustomerRepository
    + MerchantRepository
    + ReportRepository
{
}

impl<T> Repository for T where
    T: AccountRepository
        + TransactionRepository
        + SettlementRepository
        + BeneficiaryRepository
        + CustomerRepository
        + MerchantRepository
        + ReportRepository
{
}
