//! In-memory repository.
//!
//! Every unit of work runs against a copy of the tables under one lock and the copy is
//! swapped in only when the whole unit succeeds, so a failed transfer or payout leaves
//! nothing behind.

use async_trait::async_trait;
use chrono::Datelike;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;

use sp_payment_common::{
    time, AccountId, AccountType, BeneficiaryId, BeneficiaryStatus, Charge, CustomerId,
    MerchantId, Pagination, PaymentError, Result, SettlementId, TransactionId, TransactionKind,
    TransactionStatus,
};

use crate::account::{
    Account, AccountFilter, AccountQuery, AccountUpdate, CreateAccountOutcome, NewAccount,
    OwnerName,
};
use crate::balance::BalanceDelta;
use crate::profile::{Customer, Merchant, ProfileFilter, ProfileKey};
use crate::report::{AdminReport, CustomerReport, MerchantReport, MonthlyNominal, ReportWindow};
use crate::repository::{
    AccountRepository, BeneficiaryRepository, CustomerRepository, MerchantRepository,
    ReportRepository, SettlementRepository, TransactionRepository,
};
use crate::settlement::{
    Beneficiary, BeneficiaryFilter, PayoutRequest, Settlement, SettlementFilter,
};
use crate::transaction::{NewSettlement, NewTransaction, Transaction, TransactionFilter};

#[derive(Debug, Clone)]
struct Row<T> {
    record: T,
    live: bool,
}

impl<T> Row<T> {
    fn new(record: T) -> Self {
        Self { record, live: true }
    }
}

fn live<T>(rows: &[Row<T>]) -> impl DoubleEndedIterator<Item = &T> {
    rows.iter().filter(|r| r.live).map(|r| &r.record)
}

fn page_of<T>(items: impl Iterator<Item = T>, page: Pagination) -> Vec<T> {
    items
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: Vec<Row<Account>>,
    transactions: Vec<Row<Transaction>>,
    settlements: Vec<Row<Settlement>>,
    beneficiaries: Vec<Row<Beneficiary>>,
    customers: Vec<Row<Customer>>,
    merchants: Vec<Row<Merchant>>,
}

impl Tables {
    fn account(&self, id: AccountId) -> Option<&Account> {
        live(&self.accounts).find(|a| a.id == id)
    }

    fn customer_by_user(&self, user_id: &str) -> Option<&Customer> {
        live(&self.customers).find(|c| c.user_id == user_id)
    }

    fn merchant_by_user(&self, user_id: &str) -> Option<&Merchant> {
        live(&self.merchants).find(|m| m.user_id == user_id)
    }

    fn owner_name(&self, owner_id: &str, account_type: AccountType) -> Option<OwnerName> {
        match account_type {
            AccountType::Customer => self
                .customer_by_user(owner_id)
                .map(|c| OwnerName::Sealed(c.legal_name.clone())),
            AccountType::Merchant => self
                .merchant_by_user(owner_id)
                .map(|m| OwnerName::Plain(m.name.clone())),
        }
    }

    fn with_owner_name(&self, account: &Account) -> Account {
        let mut account = account.clone();
        account.owner_name = self.owner_name(&account.owner_id, account.account_type);
        account
    }

    fn with_names(&self, trx: &Transaction) -> Transaction {
        let mut trx = trx.clone();

        // Joined regardless of tombstones, like the history it describes.
        let owner_of = |id: AccountId| {
            self.accounts
                .iter()
                .find(|r| r.record.id == id)
                .map(|r| r.record.owner_id.clone())
        };

        trx.sender_name = if trx.kind.is_system_issued() {
            None
        } else {
            owner_of(trx.sender_id).and_then(|owner| {
                self.owner_name(&owner, AccountType::Customer)
                    .or_else(|| self.owner_name(&owner, AccountType::Merchant))
            })
        };

        let recipient_type = if trx.kind.has_customer_recipient() {
            AccountType::Customer
        } else {
            AccountType::Merchant
        };
        trx.recipient_name =
            owner_of(trx.recipient_id).and_then(|owner| self.owner_name(&owner, recipient_type));
        trx
    }

    fn merchant_name(&self, merchant_id: MerchantId) -> Option<String> {
        live(&self.merchants)
            .find(|m| m.id == merchant_id)
            .map(|m| m.name.clone())
    }

    fn with_merchant_name(&self, settlement: &Settlement) -> Settlement {
        let mut settlement = settlement.clone();
        settlement.merchant_name = self.merchant_name(settlement.merchant_id);
        settlement
    }

    fn ensure_covered(&self, id: AccountId, charge: &Charge) -> Result<()> {
        let account = self
            .account(id)
            .ok_or_else(|| PaymentError::bad_request("sender account not found"))?;

        if !charge.is_covered_by(account.balance) {
            return Err(PaymentError::InsufficientBalance {
                required: charge.required,
                available: account.balance,
            });
        }
        Ok(())
    }

    fn adjust_balance(&mut self, id: AccountId, delta: BalanceDelta) -> Result<()> {
        let account = self
            .accounts
            .iter_mut()
            .filter(|r| r.live)
            .map(|r| &mut r.record)
            .find(|a| a.id == id)
            .ok_or(PaymentError::NotFound)?;

        account.balance = delta.apply(account.balance);
        Ok(())
    }

    /// Pending total shared by the preview and the payout.
    fn pending_total(&self, merchant_id: MerchantId) -> Decimal {
        live(&self.settlements)
            .filter(|s| s.merchant_id == merchant_id && s.is_pending())
            .map(|s| s.amount)
            .sum()
    }

    fn account_matches(&self, account: &Account, filter: &AccountFilter) -> bool {
        filter.owner_id.as_deref().map_or(true, |o| account.owner_id == o)
            && filter.account_type.map_or(true, |t| account.account_type == t)
            && filter.keyword.as_deref().map_or(true, |kw| {
                matches!(
                    self.owner_name(&account.owner_id, account.account_type),
                    Some(OwnerName::Plain(name)) if name.to_lowercase().contains(&kw.to_lowercase())
                )
            })
    }

    fn sorted_transactions(&self, filter: &TransactionFilter) -> Vec<&Transaction> {
        let mut rows: Vec<&Transaction> =
            live(&self.transactions).filter(|t| filter.matches(t)).collect();
        rows.sort_by(|a, b| b.datetime.cmp(&a.datetime).then(b.id.cmp(&a.id)));
        rows
    }
}

/// Repository over process memory, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account record as-is, balance included.
    pub fn seed_account(&self, account: Account) {
        self.tables.lock().accounts.push(Row::new(account));
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.lock())
    }

    fn transact<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        let mut guard = self.tables.lock();
        let mut work = guard.clone();
        let out = f(&mut work)?;
        *guard = work;
        Ok(out)
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn find_account(&self, query: &AccountQuery) -> Result<Option<Account>> {
        Ok(self.read(|t| {
            live(&t.accounts)
                .find(|a| query.matches(a))
                .map(|a| t.with_owner_name(a))
        }))
    }

    async fn find_accounts(
        &self,
        filter: &AccountFilter,
        page: Pagination,
    ) -> Result<Vec<Account>> {
        Ok(self.read(|t| {
            let rows = live(&t.accounts)
                .rev()
                .filter(|a| t.account_matches(a, filter))
                .map(|a| t.with_owner_name(a));
            page_of(rows, page)
        }))
    }

    async fn count_accounts(&self, filter: &AccountFilter) -> Result<u64> {
        Ok(self.read(|t| live(&t.accounts).filter(|a| t.account_matches(a, filter)).count() as u64))
    }

    async fn create_account(&self, account: &NewAccount) -> Result<CreateAccountOutcome> {
        self.transact(|t| {
            if live(&t.accounts).any(|a| a.owner_id == account.owner_id) {
                return Err(PaymentError::DuplicatedResource);
            }
            if live(&t.accounts).any(|a| a.account_no_hash == account.number.account_no_hash) {
                return Ok(CreateAccountOutcome::NumberTaken);
            }

            let record = account.to_record(time::now());
            t.accounts.push(Row::new(record.clone()));
            Ok(CreateAccountOutcome::Created(record))
        })
    }

    async fn update_account(&self, update: &AccountUpdate) -> Result<()> {
        self.transact(|t| {
            if let Some(number) = &update.number {
                let taken = live(&t.accounts)
                    .any(|a| a.id != update.id && a.account_no_hash == number.account_no_hash);
                if taken {
                    return Err(PaymentError::bad_request("account number already in use"));
                }
            }

            let account = t
                .accounts
                .iter_mut()
                .filter(|r| r.live)
                .map(|r| &mut r.record)
                .find(|a| a.id == update.id)
                .ok_or(PaymentError::NotFound)?;

            if let Some(number) = &update.number {
                account.account_no = number.account_no.clone();
                account.account_no_hash = number.account_no_hash.clone();
                account.row_hash = Some(number.row_hash.clone());
            }
            if let Some(pin) = &update.pin {
                account.pin = pin.clone();
            }
            Ok(())
        })
    }

    async fn delete_account(&self, id: AccountId) -> Result<()> {
        self.transact(|t| {
            let row = t
                .accounts
                .iter_mut()
                .find(|r| r.live && r.record.id == id)
                .ok_or(PaymentError::NotFound)?;
            row.live = false;
            Ok(())
        })
    }
}

#[async_trait]
impl TransactionRepository for InMemoryRepository {
    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.read(|t| {
            live(&t.transactions)
                .find(|trx| trx.id == id)
                .map(|trx| t.with_names(trx))
        }))
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>> {
        Ok(self.read(|t| {
            let rows = t.sorted_transactions(filter).into_iter().map(|trx| t.with_names(trx));
            page_of(rows, page)
        }))
    }

    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<u64> {
        Ok(self.read(|t| live(&t.transactions).filter(|trx| filter.matches(trx)).count() as u64))
    }

    async fn create_transaction_p2p(&self, trx: &NewTransaction) -> Result<Transaction> {
        self.transact(|t| {
            t.ensure_covered(trx.sender_id, &trx.charge)?;
            t.account(trx.recipient_id)
                .ok_or_else(|| PaymentError::bad_request("recipient account not found"))?;

            t.adjust_balance(trx.sender_id, BalanceDelta::debit(trx.charge.total()))?;
            t.adjust_balance(trx.recipient_id, BalanceDelta::credit(trx.charge.nominal))?;

            let record = trx.to_record();
            t.transactions.push(Row::new(record.clone()));
            debug!(trx_id = %record.id, "P2P applied in memory");
            Ok(record)
        })
    }

    async fn create_transaction_p2b(
        &self,
        trx: &NewTransaction,
        settlement: &NewSettlement,
    ) -> Result<(Transaction, Settlement)> {
        self.transact(|t| {
            t.ensure_covered(trx.sender_id, &trx.charge)?;
            t.adjust_balance(trx.sender_id, BalanceDelta::debit(trx.charge.total()))?;

            let record = trx.to_record();
            t.transactions.push(Row::new(record.clone()));

            let pending = Settlement {
                id: settlement.id,
                transaction_id: record.id,
                merchant_id: settlement.merchant_id,
                merchant_name: None,
                beneficiary_id: BeneficiaryId::NONE,
                amount: settlement.amount,
                settlement_date: settlement.settlement_date,
            };
            t.settlements.push(Row::new(pending.clone()));
            Ok((record, pending))
        })
    }

    async fn create_transaction_system(&self, trx: &NewTransaction) -> Result<Transaction> {
        self.transact(|t| {
            t.adjust_balance(trx.recipient_id, BalanceDelta::credit(trx.charge.nominal))
                .map_err(|_| PaymentError::bad_request("recipient account not found"))?;

            let record = trx.to_record();
            t.transactions.push(Row::new(record.clone()));
            Ok(record)
        })
    }

    async fn update_transaction(&self, id: TransactionId, status: TransactionStatus) -> Result<()> {
        self.transact(|t| {
            let row = t
                .transactions
                .iter_mut()
                .find(|r| r.live && r.record.id == id)
                .ok_or(PaymentError::NotFound)?;
            row.record.status = status;
            Ok(())
        })
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        self.transact(|t| {
            let row = t
                .transactions
                .iter_mut()
                .find(|r| r.live && r.record.id == id)
                .ok_or(PaymentError::NotFound)?;
            row.live = false;
            Ok(())
        })
    }
}

#[async_trait]
impl SettlementRepository for InMemoryRepository {
    async fn find_settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        Ok(self.read(|t| {
            live(&t.settlements)
                .find(|s| s.id == id)
                .map(|s| t.with_merchant_name(s))
        }))
    }

    async fn find_settlements(
        &self,
        filter: &SettlementFilter,
        page: Pagination,
    ) -> Result<Vec<Settlement>> {
        Ok(self.read(|t| {
            let rows = live(&t.settlements)
                .rev()
                .filter(|s| filter.matches(s))
                .map(|s| t.with_merchant_name(s));
            page_of(rows, page)
        }))
    }

    async fn count_settlements(&self, filter: &SettlementFilter) -> Result<u64> {
        Ok(self.read(|t| live(&t.settlements).filter(|s| filter.matches(s)).count() as u64))
    }

    async fn find_pending_settlement(&self, merchant_id: MerchantId) -> Result<Decimal> {
        Ok(self.read(|t| t.pending_total(merchant_id)))
    }
}

#[async_trait]
impl BeneficiaryRepository for InMemoryRepository {
    async fn find_beneficiary(&self, id: BeneficiaryId) -> Result<Option<Beneficiary>> {
        Ok(self.read(|t| {
            live(&t.beneficiaries).find(|b| b.id == id).map(|b| {
                let mut b = b.clone();
                b.merchant_name = t.merchant_name(b.merchant_id);
                b
            })
        }))
    }

    async fn find_beneficiaries(
        &self,
        filter: &BeneficiaryFilter,
        page: Pagination,
    ) -> Result<Vec<Beneficiary>> {
        Ok(self.read(|t| {
            let rows = live(&t.beneficiaries)
                .rev()
                .filter(|b| filter.merchant_id.map_or(true, |m| b.merchant_id == m))
                .map(|b| {
                    let mut b = b.clone();
                    b.merchant_name = t.merchant_name(b.merchant_id);
                    b
                });
            page_of(rows, page)
        }))
    }

    async fn count_beneficiaries(&self, filter: &BeneficiaryFilter) -> Result<u64> {
        Ok(self.read(|t| {
            live(&t.beneficiaries)
                .filter(|b| filter.merchant_id.map_or(true, |m| b.merchant_id == m))
                .count() as u64
        }))
    }

    async fn create_beneficiary(&self, payout: &PayoutRequest) -> Result<Beneficiary> {
        self.transact(|t| {
            t.account(payout.merchant_account)
                .ok_or_else(|| PaymentError::bad_request("merchant account not found"))?;

            let amount = t.pending_total(payout.merchant_id);
            let beneficiary = Beneficiary {
                id: payout.beneficiary_id,
                merchant_id: payout.merchant_id,
                merchant_name: None,
                amount,
                withdrawal_date: Some(payout.requested_at),
                status: BeneficiaryStatus::Confirmed,
            };
            t.beneficiaries.push(Row::new(beneficiary.clone()));

            let mut claimed = 0;
            for row in t.settlements.iter_mut().filter(|r| r.live) {
                if row.record.merchant_id == payout.merchant_id && row.record.is_pending() {
                    row.record.beneficiary_id = payout.beneficiary_id;
                    claimed += 1;
                }
            }
            if claimed == 0 {
                return Err(PaymentError::bad_request("no pending settlement to pay out"));
            }

            t.adjust_balance(payout.merchant_account, BalanceDelta::debit(amount))?;

            let trx = NewTransaction {
                id: payout.transaction_id,
                sender_id: payout.system_account,
                recipient_id: payout.merchant_account,
                kind: TransactionKind::MerchantSystem,
                status: TransactionStatus::Success,
                charge: Charge::without_fee(amount),
                datetime: payout.requested_at,
                description: payout.description(),
            };
            t.transactions.push(Row::new(trx.to_record()));
            Ok(beneficiary)
        })
    }
}

#[async_trait]
impl CustomerRepository for InMemoryRepository {
    async fn find_customer(&self, key: &ProfileKey<CustomerId>) -> Result<Option<Customer>> {
        Ok(self.read(|t| live(&t.customers).find(|c| key.matches(c)).cloned()))
    }

    async fn find_customers(
        &self,
        _filter: &ProfileFilter,
        page: Pagination,
    ) -> Result<Vec<Customer>> {
        Ok(self.read(|t| page_of(live(&t.customers).rev().cloned(), page)))
    }

    async fn count_customers(&self, _filter: &ProfileFilter) -> Result<u64> {
        Ok(self.read(|t| live(&t.customers).count() as u64))
    }

    async fn create_customer(&self, customer: &Customer) -> Result<()> {
        self.transact(|t| {
            if t.customer_by_user(&customer.user_id).is_some() {
                return Err(PaymentError::DuplicatedResource);
            }
            t.customers.push(Row::new(customer.clone()));
            Ok(())
        })
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        self.transact(|t| {
            let stored = t
                .customers
                .iter_mut()
                .find(|r| r.live && r.record.id == customer.id)
                .ok_or(PaymentError::NotFound)?;

            let (user_id, created_at) = (stored.record.user_id.clone(), stored.record.created_at);
            stored.record = Customer {
                user_id,
                created_at,
                ..customer.clone()
            };
            Ok(())
        })
    }

    async fn delete_customer(&self, key: &ProfileKey<CustomerId>) -> Result<()> {
        self.transact(|t| {
            let row = t
                .customers
                .iter_mut()
                .find(|r| r.live && key.matches(&r.record))
                .ok_or(PaymentError::NotFound)?;
            row.live = false;
            Ok(())
        })
    }
}

#[async_trait]
impl MerchantRepository for InMemoryRepository {
    async fn find_merchant(&self, key: &ProfileKey<MerchantId>) -> Result<Option<Merchant>> {
        Ok(self.read(|t| live(&t.merchants).find(|m| key.matches(m)).cloned()))
    }

    async fn find_merchants(
        &self,
        filter: &ProfileFilter,
        page: Pagination,
    ) -> Result<Vec<Merchant>> {
        Ok(self.read(|t| {
            let rows = live(&t.merchants)
                .rev()
                .filter(|m| filter.matches_merchant(m))
                .cloned();
            page_of(rows, page)
        }))
    }

    async fn count_merchants(&self, filter: &ProfileFilter) -> Result<u64> {
        Ok(self.read(|t| live(&t.merchants).filter(|m| filter.matches_merchant(m)).count() as u64))
    }

    async fn create_merchant(&self, merchant: &Merchant) -> Result<()> {
        self.transact(|t| {
            if t.merchant_by_user(&merchant.user_id).is_some() {
                return Err(PaymentError::DuplicatedResource);
            }
            t.merchants.push(Row::new(merchant.clone()));
            Ok(())
        })
    }

    async fn update_merchant(&self, merchant: &Merchant) -> Result<()> {
        self.transact(|t| {
            let stored = t
                .merchants
                .iter_mut()
                .find(|r| r.live && r.record.id == merchant.id)
                .ok_or(PaymentError::NotFound)?;

            let (user_id, created_at) = (stored.record.user_id.clone(), stored.record.created_at);
            stored.record = Merchant {
                user_id,
                created_at,
                ..merchant.clone()
            };
            Ok(())
        })
    }

    async fn delete_merchant(&self, key: &ProfileKey<MerchantId>) -> Result<()> {
        self.transact(|t| {
            let row = t
                .merchants
                .iter_mut()
                .find(|r| r.live && key.matches(&r.record))
                .ok_or(PaymentError::NotFound)?;
            row.live = false;
            Ok(())
        })
    }
}

#[async_trait]
impl ReportRepository for InMemoryRepository {
    async fn admin_report(&self, window: ReportWindow) -> Result<AdminReport> {
        Ok(self.read(|t| {
            let in_window = |kind: TransactionKind| {
                live(&t.transactions)
                    .filter(|trx| trx.kind == kind && window.contains(trx.datetime.date_naive()))
                    .count() as u64
            };

            let year = window.from.year();
            let trx_traffic = (1..=12)
                .map(|month| MonthlyNominal {
                    month,
                    nominal: live(&t.transactions)
                        .filter(|trx| trx.datetime.year() == year && trx.datetime.month() == month)
                        .map(|trx| trx.nominal)
                        .sum(),
                })
                .collect();

            AdminReport {
                peer_trx_count: in_window(TransactionKind::PeerToPeer),
                merchant_trx_count: in_window(TransactionKind::PeerToBusiness),
                system_trx_count: in_window(TransactionKind::System),
                total_customers: live(&t.customers).count() as u64,
                total_merchants: live(&t.merchants).count() as u64,
                trx_traffic,
            }
        }))
    }

    async fn merchant_report(
        &self,
        account_id: AccountId,
        merchant_id: MerchantId,
        window: ReportWindow,
    ) -> Result<MerchantReport> {
        Ok(self.read(|t| {
            let mut report = MerchantReport::default();

            live(&t.transactions)
                .filter(|trx| {
                    trx.kind == TransactionKind::PeerToBusiness
                        && trx.recipient_id == account_id
                        && window.contains(trx.datetime.date_naive())
                })
                .for_each(|trx| report.incoming.add(trx.nominal));

            report.pending_settlement = live(&t.settlements)
                .filter(|s| {
                    s.merchant_id == merchant_id
                        && s.is_pending()
                        && window.contains(s.settlement_date.date_naive())
                })
                .map(|s| s.amount)
                .sum();

            report.paid_out = live(&t.beneficiaries)
                .filter(|b| {
                    b.merchant_id == merchant_id
                        && b.withdrawal_date
                            .map_or(false, |d| window.contains(d.date_naive()))
                })
                .map(|b| b.amount)
                .sum();

            report
        }))
    }

    async fn customer_report(
        &self,
        account_id: AccountId,
        window: ReportWindow,
    ) -> Result<CustomerReport> {
        Ok(self.read(|t| {
            let mut report = CustomerReport::default();

            for trx in live(&t.transactions)
                .filter(|trx| {
                    trx.sender_id == account_id && window.contains(trx.datetime.date_naive())
                })
            {
                match trx.kind {
                    TransactionKind::PeerToPeer => report.peer.add(trx.nominal),
                    TransactionKind::PeerToBusiness => report.merchant.add(trx.nominal),
                    _ => {}
                }
            }
            report
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::SealedNumber;

    fn dec(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    fn account(owner: &str, account_type: AccountType, balance: Decimal) -> Account {
        Account {
            id: AccountId::new(),
            owner_id: owner.to_string(),
            account_type,
            balance,
            account_no: owner.as_bytes().to_vec(),
            account_no_hash: owner.as_bytes().to_vec(),
            pin: String::new(),
            row_hash: None,
            owner_name: None,
            created_at: time::now(),
        }
    }

    fn p2p(sender: AccountId, recipient: AccountId, nominal: i64, id: u64) -> NewTransaction {
        NewTransaction {
            id: TransactionId::new(id),
            sender_id: sender,
            recipient_id: recipient,
            kind: TransactionKind::PeerToPeer,
            status: TransactionStatus::Success,
            charge: Charge::with_fee(dec(nominal)),
            datetime: time::now(),
            description: "transfer".to_string(),
        }
    }

    async fn balance(repo: &InMemoryRepository, id: AccountId) -> Decimal {
        repo.find_account(&AccountQuery::by_id(id)).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_failed_unit_leaves_nothing() {
        let repo = InMemoryRepository::new();
        let sender = account("c1", AccountType::Customer, dec(100));
        let sender_id = sender.id;
        repo.seed_account(sender);

        // Recipient missing: the sender must not be debited.
        let err = repo
            .create_transaction_p2p(&p2p(sender_id, AccountId::new(), 50, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::BadRequest(_)));
        assert_eq!(balance(&repo, sender_id).await, dec(100));
        assert_eq!(repo.count_transactions(&TransactionFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_locked_recheck_uses_unrounded_fee() {
        let repo = InMemoryRepository::new();
        let sender = account("c1", AccountType::Customer, Decimal::new(1104, 2));
        let recipient = account("c2", AccountType::Customer, dec(0));
        let (sender_id, recipient_id) = (sender.id, recipient.id);
        repo.seed_account(sender);
        repo.seed_account(recipient);

        let mut trx = p2p(sender_id, recipient_id, 0, 1);
        trx.charge = Charge::with_fee(Decimal::new(1004, 2));
        let err = repo.create_transaction_p2p(&trx).await.unwrap_err();

        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        assert_eq!(balance(&repo, sender_id).await, Decimal::new(1104, 2));
        assert_eq!(balance(&repo, recipient_id).await, dec(0));
        assert_eq!(repo.count_transactions(&TransactionFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_owner_and_number() {
        let repo = InMemoryRepository::new();
        let number = |hash: &[u8]| SealedNumber {
            account_no: vec![1],
            account_no_hash: hash.to_vec(),
            row_hash: vec![2],
        };
        let new = |owner: &str, hash: &[u8]| NewAccount {
            id: AccountId::new(),
            owner_id: owner.to_string(),
            account_type: AccountType::Customer,
            number: number(hash),
            pin: String::new(),
        };

        assert!(matches!(
            repo.create_account(&new("u1", b"h1")).await.unwrap(),
            CreateAccountOutcome::Created(_)
        ));
        assert!(matches!(
            repo.create_account(&new("u2", b"h1")).await.unwrap(),
            CreateAccountOutcome::NumberTaken
        ));
        assert_eq!(
            repo.create_account(&new("u1", b"h2")).await.unwrap_err(),
            PaymentError::DuplicatedResource
        );
    }

    #[tokio::test]
    async fn test_listing_newest_first_and_paged() {
        let repo = InMemoryRepository::new();
        let a = account("c1", AccountType::Customer, dec(1000));
        let b = account("c2", AccountType::Customer, dec(0));
        let (a_id, b_id) = (a.id, b.id);
        repo.seed_account(a);
        repo.seed_account(b);

        for i in 1..=3 {
            repo.create_transaction_p2p(&p2p(a_id, b_id, 10, i)).await.unwrap();
        }

        let filter = TransactionFilter { account_id: Some(b_id), ..Default::default() };
        let first = repo.find_transactions(&filter, Pagination::new(1, 2)).await.unwrap();
        let second = repo.find_transactions(&filter, Pagination::new(2, 2)).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(first[0].id > first[1].id);
        assert_eq!(repo.count_transactions(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_tombstoned_rows_are_hidden() {
        let repo = InMemoryRepository::new();
        let a = account("c1", AccountType::Customer, dec(0));
        let id = a.id;
        repo.seed_account(a);

        repo.delete_account(id).await.unwrap();
        assert!(repo.find_account(&AccountQuery::by_id(id)).await.unwrap().is_none());
        assert_eq!(repo.delete_account(id).await.unwrap_err(), PaymentError::NotFound);
    }
}
