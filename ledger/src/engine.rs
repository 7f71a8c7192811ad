//! Core ledger engine implementation.
//!
//! The engine checks the preconditions of each transaction protocol, builds the records
//! and hands them to the repository as one unit of work. The repository re-checks the
//! balance under its row locks.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use sp_payment_common::{
    time, AccountId, AccountType, Charge, MerchantId, PaymentError, Result, SnowflakeGenerator,
    TransactionKind, TransactionStatus, MONEY_DECIMAL_PLACES,
};

use crate::account::{Account, AccountQuery};
use crate::profile::{Merchant, ProfileKey};
use crate::repository::Repository;
use crate::settlement::{Beneficiary, PayoutRequest, Settlement};
use crate::transaction::{NewSettlement, NewTransaction, Transaction};

/// A customer-initiated money movement.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender: AccountId,
    pub recipient: AccountId,
    pub nominal: Decimal,
    pub description: String,
}

impl TransferRequest {
    /// Create a new transfer request.
    pub fn new(
        sender: AccountId,
        recipient: AccountId,
        nominal: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            recipient,
            nominal,
            description: description.into(),
        }
    }
}

/// The ledger engine runs the P2P, P2B, system and payout protocols.
pub struct LedgerEngine {
    repo: Arc<dyn Repository>,
    ids: Arc<SnowflakeGenerator>,
    system_account: AccountId,
}

impl LedgerEngine {
    /// Create a new ledger engine.
    pub fn new(
        repo: Arc<dyn Repository>,
        ids: Arc<SnowflakeGenerator>,
        system_account: AccountId,
    ) -> Self {
        Self {
            repo,
            ids,
            system_account,
        }
    }

    /// Sender of every system-issued transaction.
    pub fn system_account(&self) -> AccountId {
        self.system_account
    }

    /// Move `nominal` from one customer-held account to a customer account, charging the fee.
    #[instrument(
        skip(self, req),
        fields(sender = %req.sender, recipient = %req.recipient, nominal = %req.nominal)
    )]
    pub async fn transfer_p2p(&self, req: &TransferRequest) -> Result<Transaction> {
        let charge = charge_for(req.nominal)?;
        if req.sender == req.recipient {
            return Err(PaymentError::bad_request("sender and recipient are the same account"));
        }

        let sender = self.account(req.sender, "sender").await?;
        let recipient = self.account(req.recipient, "recipient").await?;
        if recipient.account_type != AccountType::Customer {
            return Err(PaymentError::bad_request("recipient is not a customer"));
        }
        ensure_covered(&sender, &charge)?;

        let trx = self.new_transaction(req, TransactionKind::PeerToPeer, charge);
        let record = self.repo.create_transaction_p2p(&trx).await?;

        info!(trx_id = %record.id, fee = %charge.fee, "P2P transfer committed");
        Ok(record)
    }

    /// Pay a merchant. The sender is debited now; the merchant is owed a pending settlement.
    #[instrument(
        skip(self, req),
        fields(sender = %req.sender, recipient = %req.recipient, nominal = %req.nominal)
    )]
    pub async fn pay_merchant(&self, req: &TransferRequest) -> Result<(Transaction, Settlement)> {
        let charge = charge_for(req.nominal)?;
        if req.sender == req.recipient {
            return Err(PaymentError::bad_request("sender and recipient are the same account"));
        }

        let sender = self.account(req.sender, "sender").await?;
        let recipient = self.account(req.recipient, "recipient").await?;
        if recipient.account_type != AccountType::Merchant {
            return Err(PaymentError::bad_request("recipient is not a merchant"));
        }
        let merchant = self.merchant_of(&recipient).await?;
        ensure_covered(&sender, &charge)?;

        let trx = self.new_transaction(req, TransactionKind::PeerToBusiness, charge);
        let settlement = NewSettlement {
            id: self.ids.settlement_id(),
            merchant_id: merchant.id,
            amount: charge.nominal,
            settlement_date: trx.datetime,
        };
        let (record, pending) = self.repo.create_transaction_p2b(&trx, &settlement).await?;

        info!(
            trx_id = %record.id,
            settlement_id = %pending.id,
            merchant_id = %merchant.id,
            "P2B payment committed"
        );
        Ok((record, pending))
    }

    /// Credit a customer account from the system account. No fee, no sender balance.
    #[instrument(skip(self, description))]
    pub async fn issue_system(
        &self,
        recipient: AccountId,
        nominal: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let charge = positive(nominal).map(Charge::without_fee)?;

        let account = self.account(recipient, "recipient").await?;
        if account.account_type != AccountType::Customer {
            return Err(PaymentError::bad_request("recipient is not a customer"));
        }

        let req = TransferRequest::new(self.system_account, recipient, nominal, description);
        let trx = self.new_transaction(&req, TransactionKind::System, charge);
        let record = self.repo.create_transaction_system(&trx).await?;

        info!(trx_id = %record.id, "System credit committed");
        Ok(record)
    }

    /// Pay out every pending settlement of a merchant into a new beneficiary.
    #[instrument(skip(self))]
    pub async fn pay_out(
        &self,
        merchant_id: MerchantId,
        merchant_account: AccountId,
    ) -> Result<Beneficiary> {
        let payout = PayoutRequest {
            beneficiary_id: self.ids.beneficiary_id(),
            merchant_id,
            merchant_account,
            system_account: self.system_account,
            transaction_id: self.ids.transaction_id(),
            requested_at: time::now(),
        };

        let beneficiary = self.repo.create_beneficiary(&payout).await.map_err(|e| {
            warn!(error = %e, "Payout rejected");
            e
        })?;

        info!(
            beneficiary_id = %beneficiary.id,
            amount = %beneficiary.amount,
            "Payout committed"
        );
        Ok(beneficiary)
    }

    async fn account(&self, id: AccountId, side: &str) -> Result<Account> {
        self.repo
            .find_account(&AccountQuery::by_id(id))
            .await?
            .ok_or_else(|| PaymentError::bad_request(format!("{} account not found", side)))
    }

    async fn merchant_of(&self, account: &Account) -> Result<Merchant> {
        self.repo
            .find_merchant(&ProfileKey::User(account.owner_id.clone()))
            .await?
            .ok_or_else(|| PaymentError::bad_request("recipient merchant not found"))
    }

    fn new_transaction(
        &self,
        req: &TransferRequest,
        kind: TransactionKind,
        charge: Charge,
    ) -> NewTransaction {
        NewTransaction {
            id: self.ids.transaction_id(),
            sender_id: req.sender,
            recipient_id: req.recipient,
            kind,
            status: TransactionStatus::Success,
            charge,
            datetime: time::now(),
            description: req.description.clone(),
        }
    }
}

fn positive(nominal: Decimal) -> Result<Decimal> {
    if nominal <= Decimal::ZERO {
        return Err(PaymentError::bad_request("nominal must be positive"));
    }
    if nominal.normalize().scale() > MONEY_DECIMAL_PLACES {
        return Err(PaymentError::bad_request("nominal has more than two decimals"));
    }
    Ok(nominal)
}

fn charge_for(nominal: Decimal) -> Result<Charge> {
    positive(nominal).map(Charge::with_fee)
}

fn ensure_covered(sender: &Account, charge: &Charge) -> Result<()> {
    if !charge.is_covered_by(sender.balance) {
        return Err(PaymentError::InsufficientBalance {
            required: charge.required,
            available: sender.balance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use crate::repository::{
        AccountRepository, MerchantRepository, SettlementRepository, TransactionRepository,
    };
    use crate::settlement::SettlementFilter;
    use crate::transaction::TransactionFilter;
    use sp_payment_common::{BeneficiaryStatus, Pagination};

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

    fn merchant(user_id: &str) -> Merchant {
        Merchant {
            id: MerchantId::new(),
            user_id: user_id.to_string(),
            name: "Warung Sate".to_string(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            pic_name: vec![1],
            pic_email: vec![2],
            pic_phone: vec![3],
            photo_profile: String::new(),
            row_hash: None,
            created_at: time::now(),
        }
    }

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        engine: LedgerEngine,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = LedgerEngine::new(
            repo.clone(),
            Arc::new(SnowflakeGenerator::new(1)),
            AccountId::new(),
        );
        Fixture { repo, engine }
    }

    impl Fixture {
        fn seed(&self, owner: &str, account_type: AccountType, balance: i64) -> AccountId {
            let acc = account(owner, account_type, dec(balance));
            let id = acc.id;
            self.repo.seed_account(acc);
            id
        }

        async fn balance(&self, id: AccountId) -> Decimal {
            self.repo
                .find_account(&AccountQuery::by_id(id))
                .await
                .unwrap()
                .unwrap()
                .balance
        }
    }

    #[tokio::test]
    async fn test_p2p_moves_nominal_and_burns_fee() {
        let fx = fixture();
        let a = fx.seed("c1", AccountType::Customer, 1000);
        let b = fx.seed("c2", AccountType::Customer, 50);

        let trx = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, b, dec(200), "rent"))
            .await
            .unwrap();

        assert_eq!(trx.kind, TransactionKind::PeerToPeer);
        assert_eq!(trx.fee, dec(20));
        assert_eq!(fx.balance(a).await, dec(780));
        assert_eq!(fx.balance(b).await, dec(250));
        // Total balance shrinks by exactly the fee.
        assert_eq!(fx.balance(a).await + fx.balance(b).await, dec(1030));
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let fx = fixture();
        let a = fx.seed("c1", AccountType::Customer, 109);
        let b = fx.seed("c2", AccountType::Customer, 0);

        let err = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, b, dec(100), "too much"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PaymentError::InsufficientBalance {
                required: dec(110),
                available: dec(109),
            }
        );
        assert_eq!(fx.balance(a).await, dec(109));
        assert_eq!(fx.balance(b).await, dec(0));
        assert_eq!(
            fx.repo.count_transactions(&TransactionFilter::default()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_rounded_down_fee_does_not_lower_the_bar() {
        let fx = fixture();
        let exact = |v: i64| Decimal::new(v, 2);
        let sender = account("c1", AccountType::Customer, exact(1104));
        let a = sender.id;
        fx.repo.seed_account(sender);
        let b = fx.seed("c2", AccountType::Customer, 0);

        // 10.04 carries a fee of 1.004, stored as 1.00.
        let err = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, b, exact(1004), "split bill"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PaymentError::InsufficientBalance {
                required: Decimal::new(11044, 3),
                available: exact(1104),
            }
        );
        assert_eq!(fx.balance(a).await, exact(1104));
        assert_eq!(fx.balance(b).await, dec(0));
        assert_eq!(
            fx.repo.count_transactions(&TransactionFilter::default()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_p2b_insufficient_balance_writes_nothing() {
        let fx = fixture();
        let c1 = fx.seed("c1", AccountType::Customer, 109);
        let m1_account = fx.seed("m1", AccountType::Merchant, 0);
        let m1 = merchant("m1");
        let m1_id = m1.id;
        fx.repo.create_merchant(&m1).await.unwrap();

        let err = fx
            .engine
            .pay_merchant(&TransferRequest::new(c1, m1_account, dec(100), "groceries"))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        assert_eq!(fx.balance(c1).await, dec(109));
        assert_eq!(fx.balance(m1_account).await, dec(0));
        assert_eq!(
            fx.repo.count_transactions(&TransactionFilter::default()).await.unwrap(),
            0
        );
        assert_eq!(
            fx.repo
                .count_settlements(&SettlementFilter::default())
                .await
                .unwrap(),
            0
        );
        assert_eq!(fx.repo.find_pending_settlement(m1_id).await.unwrap(), dec(0));
    }

    #[tokio::test]
    async fn test_rejected_p2b_leaves_pending_total() {
        let fx = fixture();
        let c1 = fx.seed("c1", AccountType::Customer, 200);
        let m1_account = fx.seed("m1", AccountType::Merchant, 0);
        let m1 = merchant("m1");
        let m1_id = m1.id;
        fx.repo.create_merchant(&m1).await.unwrap();
        let pay = |nominal: i64| TransferRequest::new(c1, m1_account, dec(nominal), "snacks");

        fx.engine.pay_merchant(&pay(100)).await.unwrap();
        let rejected = fx.engine.pay_merchant(&pay(90)).await;
        assert!(matches!(rejected, Err(PaymentError::InsufficientBalance { .. })));
        fx.engine.pay_merchant(&pay(50)).await.unwrap();

        assert_eq!(fx.balance(c1).await, dec(35));
        let quoted = fx.repo.find_pending_settlement(m1_id).await.unwrap();
        assert_eq!(quoted, dec(150));

        let paid = fx.engine.pay_out(m1_id, m1_account).await.unwrap();
        assert_eq!(paid.amount, quoted);
    }

    #[tokio::test]
    async fn test_nominal_beyond_cents_is_rejected() {
        let fx = fixture();
        let a = fx.seed("c1", AccountType::Customer, 1000);
        let b = fx.seed("c2", AccountType::Customer, 0);

        let err = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, b, Decimal::new(12345, 3), "odd"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::BadRequest(_)));

        let err = fx
            .engine
            .issue_system(b, Decimal::new(1005, 3), "top up")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::BadRequest(_)));
        assert_eq!(fx.balance(a).await, dec(1000));
        assert_eq!(fx.balance(b).await, dec(0));

        // Trailing zeros are still cents.
        fx.engine
            .issue_system(b, Decimal::new(12500, 3), "top up")
            .await
            .unwrap();
        assert_eq!(fx.balance(b).await, Decimal::new(125, 1));
    }

    #[tokio::test]
    async fn test_p2p_preconditions() {
        let fx = fixture();
        let a = fx.seed("c1", AccountType::Customer, 1000);
        let m = fx.seed("m1", AccountType::Merchant, 0);

        let same = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, a, dec(10), ""))
            .await;
        assert!(matches!(same, Err(PaymentError::BadRequest(_))));

        let to_merchant = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, m, dec(10), ""))
            .await;
        assert!(matches!(to_merchant, Err(PaymentError::BadRequest(_))));

        let zero = fx
            .engine
            .transfer_p2p(&TransferRequest::new(a, m, Decimal::ZERO, ""))
            .await;
        assert!(matches!(zero, Err(PaymentError::BadRequest(_))));

        let missing = fx
            .engine
            .transfer_p2p(&TransferRequest::new(AccountId::new(), a, dec(10), ""))
            .await;
        assert!(matches!(missing, Err(PaymentError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_p2b_then_payout() {
        let fx = fixture();
        let c1 = fx.seed("c1", AccountType::Customer, 1000);
        let m1_account = fx.seed("m1", AccountType::Merchant, 0);
        let m1 = merchant("m1");
        let m1_id = m1.id;
        fx.repo.create_merchant(&m1).await.unwrap();

        let (trx, settlement) = fx
            .engine
            .pay_merchant(&TransferRequest::new(c1, m1_account, dec(100), "coffee"))
            .await
            .unwrap();

        assert_eq!(trx.kind, TransactionKind::PeerToBusiness);
        assert!(settlement.is_pending());
        assert_eq!(fx.balance(c1).await, dec(890));
        assert_eq!(fx.balance(m1_account).await, dec(0));
        assert_eq!(fx.repo.find_pending_settlement(m1_id).await.unwrap(), dec(100));

        let beneficiary = fx.engine.pay_out(m1_id, m1_account).await.unwrap();

        assert_eq!(beneficiary.amount, dec(100));
        assert_eq!(beneficiary.status, BeneficiaryStatus::Confirmed);
        assert_eq!(fx.balance(m1_account).await, dec(-100));
        assert_eq!(fx.repo.find_pending_settlement(m1_id).await.unwrap(), dec(0));

        let claimed = fx
            .repo
            .find_settlement(settlement.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.beneficiary_id, beneficiary.id);

        let payouts = fx
            .repo
            .find_transactions(
                &TransactionFilter {
                    kinds: vec![TransactionKind::MerchantSystem],
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].sender_id, fx.engine.system_account());
        assert!(payouts[0].description.contains(&beneficiary.id.to_string()));
    }

    #[tokio::test]
    async fn test_p2b_requires_merchant_profile() {
        let fx = fixture();
        let c1 = fx.seed("c1", AccountType::Customer, 1000);
        let orphan = fx.seed("m-gone", AccountType::Merchant, 0);

        let err = fx
            .engine
            .pay_merchant(&TransferRequest::new(c1, orphan, dec(10), ""))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::BadRequest(_)));
        assert_eq!(fx.balance(c1).await, dec(1000));
    }

    #[tokio::test]
    async fn test_payout_without_pending_settlements() {
        let fx = fixture();
        let m1_account = fx.seed("m1", AccountType::Merchant, 0);
        let m1 = merchant("m1");
        let m1_id = m1.id;
        fx.repo.create_merchant(&m1).await.unwrap();

        let err = fx.engine.pay_out(m1_id, m1_account).await.unwrap_err();

        assert!(matches!(err, PaymentError::BadRequest(_)));
        assert_eq!(fx.balance(m1_account).await, dec(0));
        assert_eq!(
            fx.repo
                .count_settlements(&SettlementFilter::default())
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            fx.repo.count_transactions(&TransactionFilter::default()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_system_credit_targets_customers_only() {
        let fx = fixture();
        let c1 = fx.seed("c1", AccountType::Customer, 0);
        let m1 = fx.seed("m1", AccountType::Merchant, 0);

        let trx = fx.engine.issue_system(c1, dec(500), "top up").await.unwrap();
        assert_eq!(trx.kind, TransactionKind::System);
        assert_eq!(trx.fee, Decimal::ZERO);
        assert_eq!(fx.balance(c1).await, dec(500));

        let err = fx.engine.issue_system(m1, dec(500), "top up").await.unwrap_err();
        assert!(matches!(err, PaymentError::BadRequest(_)));
        assert_eq!(fx.balance(m1).await, dec(0));
    }
}
