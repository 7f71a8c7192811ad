//! Settlement reconciler: the read side of settlements and payouts.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use sp_payment_common::{
    BeneficiaryId, ListMeta, MerchantId, Pagination, PaymentError, Result, SettlementId,
};

use crate::repository::Repository;
use crate::settlement::{Beneficiary, BeneficiaryFilter, Settlement, SettlementFilter};

/// Lists settlements and beneficiaries and quotes pending totals.
pub struct SettlementReconciler {
    repo: Arc<dyn Repository>,
}

impl SettlementReconciler {
    /// Create a new reconciler.
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Sum of the merchant's unclaimed settlements. A payout started now pays this amount.
    #[instrument(skip(self))]
    pub async fn pending_total(&self, merchant_id: MerchantId) -> Result<Decimal> {
        self.repo.find_pending_settlement(merchant_id).await
    }

    /// One page of settlements with its metadata.
    #[instrument(skip(self))]
    pub async fn settlements(
        &self,
        filter: &SettlementFilter,
        page: Pagination,
    ) -> Result<(Vec<Settlement>, ListMeta)> {
        let total = self.repo.count_settlements(filter).await?;
        if total == 0 {
            debug!("No settlements match");
            return Ok((Vec::new(), page.meta(0)));
        }

        let rows = self.repo.find_settlements(filter, page).await?;
        Ok((rows, page.meta(total)))
    }

    /// One settlement. `NotFound` when it does not exist.
    pub async fn settlement(&self, id: SettlementId) -> Result<Settlement> {
        self.repo
            .find_settlement(id)
            .await?
            .ok_or(PaymentError::NotFound)
    }

    /// One page of beneficiaries with its metadata.
    #[instrument(skip(self))]
    pub async fn beneficiaries(
        &self,
        filter: &BeneficiaryFilter,
        page: Pagination,
    ) -> Result<(Vec<Beneficiary>, ListMeta)> {
        let total = self.repo.count_beneficiaries(filter).await?;
        if total == 0 {
            return Ok((Vec::new(), page.meta(0)));
        }

        let rows = self.repo.find_beneficiaries(filter, page).await?;
        Ok((rows, page.meta(total)))
    }

    /// One beneficiary. `NotFound` when it does not exist.
    pub async fn beneficiary(&self, id: BeneficiaryId) -> Result<Beneficiary> {
        self.repo
            .find_beneficiary(id)
            .await?
            .ok_or(PaymentError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::engine::{LedgerEngine, TransferRequest};
    use crate::memory::InMemoryRepository;
    use crate::profile::Merchant;
    use crate::repository::MerchantRepository;
    use sp_payment_common::{time, AccountId, AccountType, SnowflakeGenerator};

    fn account(owner: &str, account_type: AccountType, balance: i64) -> Account {
        Account {
            id: AccountId::new(),
            owner_id: owner.to_string(),
            account_type,
            balance: Decimal::new(balance, 0),
            account_no: owner.as_bytes().to_vec(),
            account_no_hash: owner.as_bytes().to_vec(),
            pin: String::new(),
            row_hash: None,
            owner_name: None,
            created_at: time::now(),
        }
    }

    #[tokio::test]
    async fn test_preview_matches_payout() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = LedgerEngine::new(
            repo.clone(),
            Arc::new(SnowflakeGenerator::new(2)),
            AccountId::new(),
        );
        let reconciler = SettlementReconciler::new(repo.clone());

        let customer = account("c1", AccountType::Customer, 1000);
        let shop = account("m1", AccountType::Merchant, 0);
        let (c_id, m_account) = (customer.id, shop.id);
        repo.seed_account(customer);
        repo.seed_account(shop);

        let merchant = Merchant {
            id: MerchantId::new(),
            user_id: "m1".to_string(),
            name: "Toko Buku".to_string(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            pic_name: vec![],
            pic_email: vec![],
            pic_phone: vec![],
            photo_profile: String::new(),
            row_hash: None,
            created_at: time::now(),
        };
        let m_id = merchant.id;
        repo.create_merchant(&merchant).await.unwrap();

        for nominal in [40, 35] {
            let req = TransferRequest::new(c_id, m_account, Decimal::new(nominal, 0), "book");
            engine.pay_merchant(&req).await.unwrap();
        }

        let quoted = reconciler.pending_total(m_id).await.unwrap();
        assert_eq!(quoted, Decimal::new(75, 0));

        let pending = SettlementFilter {
            merchant_id: Some(m_id),
            beneficiary_id: Some(BeneficiaryId::NONE),
        };
        let (rows, meta) = reconciler.settlements(&pending, Pagination::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(meta.total_item, 2);
        assert_eq!(rows[0].merchant_name.as_deref(), Some("Toko Buku"));

        let paid = engine.pay_out(m_id, m_account).await.unwrap();
        assert_eq!(paid.amount, quoted);
        assert_eq!(reconciler.pending_total(m_id).await.unwrap(), Decimal::ZERO);

        let (rows, meta) = reconciler.settlements(&pending, Pagination::default()).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(meta.total_page, 0);

        let fetched = reconciler.beneficiary(paid.id).await.unwrap();
        assert_eq!(fetched.merchant_name.as_deref(), Some("Toko Buku"));

        let (list, meta) = reconciler
            .beneficiaries(&BeneficiaryFilter { merchant_id: Some(m_id) }, Pagination::new(1, 10))
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(meta.total_item, 1);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let reconciler = SettlementReconciler::new(Arc::new(InMemoryRepository::new()));

        assert_eq!(
            reconciler.settlement(SettlementId::new(42)).await.unwrap_err(),
            PaymentError::NotFound
        );
        assert_eq!(
            reconciler.beneficiary(BeneficiaryId::new(42)).await.unwrap_err(),
            PaymentError::NotFound
        );
    }
}
