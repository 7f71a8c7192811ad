//! Business services.
//!
//! Every operation takes the caller's [`RequestPrincipal`] explicitly, checks its scope
//! first and works through the shared [`ServiceContext`].

pub mod accounts;
pub mod beneficiaries;
pub mod customers;
pub mod dashboard;
pub mod merchants;
pub mod settlements;
pub mod transactions;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use sp_payment_common::{
    AccountId, MerchantId, PaymentError, RequestPrincipal, Result, Role, SnowflakeGenerator,
};
use sp_payment_crypto::{FieldCipher, StampStatus};
use sp_payment_ledger::{
    Account, AccountQuery, LedgerEngine, Merchant, OwnerName, ProfileKey, Repository,
    SettlementReconciler,
};

use crate::events::EventPublisher;
use crate::identity::IdentityClient;
use crate::metrics::Metrics;

pub use accounts::AccountService;
pub use beneficiaries::BeneficiaryService;
pub use customers::CustomerService;
pub use dashboard::DashboardService;
pub use merchants::MerchantService;
pub use settlements::SettlementService;
pub use transactions::TransactionService;

/// Everything the services share.
pub struct ServiceContext {
    pub repo: Arc<dyn Repository>,
    pub cipher: FieldCipher,
    pub identity: Arc<dyn IdentityClient>,
    pub publisher: Arc<dyn EventPublisher>,
    pub engine: LedgerEngine,
    pub reconciler: SettlementReconciler,
    pub metrics: Arc<Metrics>,
}

impl ServiceContext {
    /// Create a new context. The engine and reconciler share `repo`.
    pub fn new(
        repo: Arc<dyn Repository>,
        cipher: FieldCipher,
        identity: Arc<dyn IdentityClient>,
        publisher: Arc<dyn EventPublisher>,
        ids: Arc<SnowflakeGenerator>,
        system_account: AccountId,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            engine: LedgerEngine::new(repo.clone(), ids, system_account),
            reconciler: SettlementReconciler::new(repo.clone()),
            repo,
            cipher,
            identity,
            publisher,
            metrics,
        }
    }

    /// Check the stamp of a row served on its own. Any failure aborts the read.
    pub(crate) fn verify_row(
        &self,
        entity: &str,
        id: &dyn fmt::Display,
        fields: &[&[u8]],
        stamp: Option<&[u8]>,
    ) -> Result<()> {
        let status = self.cipher.verify_stamp(fields, stamp);
        if status.is_valid() {
            return Ok(());
        }

        self.metrics.integrity_violation();
        error!(entity = %entity, id = %id, status = ?status, "Row integrity violation");
        Err(PaymentError::integrity(entity))
    }

    /// Check the stamp of a row served in a list. The row stays in the list.
    pub(crate) fn check_listed_row(
        &self,
        entity: &str,
        id: &dyn fmt::Display,
        fields: &[&[u8]],
        stamp: Option<&[u8]>,
    ) {
        let status = self.cipher.verify_stamp(fields, stamp);
        if status.is_valid() {
            return;
        }

        self.metrics.integrity_violation();
        match status {
            StampStatus::Missing => {
                warn!(entity = %entity, id = %id, "Row hash not found")
            }
            _ => warn!(entity = %entity, id = %id, "Row integrity violation in list"),
        }
    }

    /// Decrypt a text field of a row served on its own.
    pub(crate) fn open(&self, entity: &str, blob: &[u8]) -> Result<String> {
        self.cipher.decrypt_string(blob).map_err(|e| {
            self.metrics.integrity_violation();
            error!(entity = %entity, error = %e, "Failed to decrypt field");
            PaymentError::integrity(entity)
        })
    }

    /// Decrypt a text field of a listed row. An undecryptable field reads as empty.
    pub(crate) fn open_listed(&self, entity: &str, blob: &[u8]) -> String {
        self.cipher.decrypt_string(blob).unwrap_or_else(|e| {
            self.metrics.integrity_violation();
            warn!(entity = %entity, error = %e, "Failed to decrypt listed field");
            String::new()
        })
    }

    /// Display form of a joined owner name.
    pub(crate) fn owner_name(&self, name: Option<&OwnerName>) -> String {
        match name {
            Some(OwnerName::Sealed(blob)) => self.open_listed("customers", blob),
            Some(OwnerName::Plain(name)) => name.clone(),
            None => String::new(),
        }
    }

    /// The caller's live account, if any.
    pub(crate) async fn own_account(
        &self,
        principal: &RequestPrincipal,
    ) -> Result<Option<Account>> {
        self.repo
            .find_account(&AccountQuery::by_owner(principal.user_id.as_str()))
            .await
    }

    /// The caller's merchant profile. `NotFound` when the caller has none.
    pub(crate) async fn own_merchant(&self, principal: &RequestPrincipal) -> Result<Merchant> {
        self.repo
            .find_merchant(&ProfileKey::User(principal.user_id.clone()))
            .await?
            .ok_or(PaymentError::NotFound)
    }

    /// Merchant a settlement or payout operation applies to. Merchants are pinned to
    /// their own profile; other roles name one or none.
    pub(crate) async fn merchant_scope(
        &self,
        principal: &RequestPrincipal,
        requested: Option<&str>,
    ) -> Result<Option<MerchantId>> {
        if principal.is(Role::Merchant) {
            return Ok(Some(self.own_merchant(principal).await?.id));
        }

        requested
            .map(|id| {
                MerchantId::parse(id.trim())
                    .map_err(|_| PaymentError::bad_request("invalid merchant_id"))
            })
            .transpose()
    }
}

/// All services over one context.
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<AccountService>,
    pub transactions: Arc<TransactionService>,
    pub settlements: Arc<SettlementService>,
    pub beneficiaries: Arc<BeneficiaryService>,
    pub customers: Arc<CustomerService>,
    pub merchants: Arc<MerchantService>,
    pub dashboard: Arc<DashboardService>,
}

impl Services {
    /// Create every service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(ctx.clone())),
            transactions: Arc::new(TransactionService::new(ctx.clone())),
            settlements: Arc::new(SettlementService::new(ctx.clone())),
            beneficiaries: Arc::new(BeneficiaryService::new(ctx.clone())),
            customers: Arc::new(CustomerService::new(ctx.clone())),
            merchants: Arc::new(MerchantService::new(ctx.clone())),
            dashboard: Arc::new(DashboardService::new(ctx)),
        }
    }
}
