//! Beneficiary (payout) service.

use std::sync::Arc;

use tracing::{instrument, warn};

use sp_payment_common::{
    time, BeneficiaryId, MerchantId, PaymentError, RequestPrincipal, Result, Role,
};
use sp_payment_ledger::{AccountQuery, Beneficiary, BeneficiaryFilter, ProfileKey};

use crate::dto::{
    BeneficiariesQuery, BeneficiaryPayload, BeneficiaryResponse, ListBeneficiaryResponse,
    PendingSettlementResponse,
};

use super::ServiceContext;

fn beneficiary_response(beneficiary: &Beneficiary) -> BeneficiaryResponse {
    BeneficiaryResponse {
        id: beneficiary.id.value(),
        merchant_id: beneficiary.merchant_id.to_string(),
        merchant_name: beneficiary.merchant_name.clone().unwrap_or_default(),
        amount: beneficiary.amount,
        withdrawal_date: beneficiary
            .withdrawal_date
            .map(time::format_verbose)
            .unwrap_or_default(),
        status: beneficiary.status.code(),
    }
}

/// Payouts of pending settlements.
pub struct BeneficiaryService {
    ctx: Arc<ServiceContext>,
}

impl BeneficiaryService {
    /// Create a new beneficiary service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    async fn target_merchant(
        &self,
        principal: &RequestPrincipal,
        payload: &BeneficiaryPayload,
    ) -> Result<MerchantId> {
        let requested = Some(payload.merchant_id.as_str()).filter(|id| !id.trim().is_empty());
        self.ctx
            .merchant_scope(principal, requested)
            .await?
            .ok_or(PaymentError::MissingRequiredAttribute("merchant_id"))
    }

    /// List payouts. Merchants see their own.
    #[instrument(skip(self, principal, query), fields(user_id = %principal.user_id))]
    pub async fn list_beneficiaries(
        &self,
        principal: &RequestPrincipal,
        query: &BeneficiariesQuery,
    ) -> Result<ListBeneficiaryResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let filter = BeneficiaryFilter {
            merchant_id: self.ctx.merchant_scope(principal, query.merchant_id()).await?,
        };
        let (rows, meta) = self
            .ctx
            .reconciler
            .beneficiaries(&filter, query.page.pagination())
            .await?;

        Ok(ListBeneficiaryResponse {
            beneficiaries: rows.iter().map(beneficiary_response).collect(),
            meta,
        })
    }

    /// One payout. Merchants only see their own.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_beneficiary(
        &self,
        principal: &RequestPrincipal,
        id: BeneficiaryId,
    ) -> Result<BeneficiaryResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let beneficiary = self.ctx.reconciler.beneficiary(id).await?;
        if let Some(merchant_id) = self.ctx.merchant_scope(principal, None).await? {
            if beneficiary.merchant_id != merchant_id {
                return Err(PaymentError::NotFound);
            }
        }
        Ok(beneficiary_response(&beneficiary))
    }

    /// Amount a payout started now would pay.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn preview_beneficiary(
        &self,
        principal: &RequestPrincipal,
        payload: &BeneficiaryPayload,
    ) -> Result<PendingSettlementResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let merchant_id = self.target_merchant(principal, payload).await?;
        let amount = self.ctx.reconciler.pending_total(merchant_id).await?;
        Ok(PendingSettlementResponse {
            merchant_id: merchant_id.to_string(),
            amount,
        })
    }

    /// Pay out every pending settlement of the merchant.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn create_beneficiary(
        &self,
        principal: &RequestPrincipal,
        payload: &BeneficiaryPayload,
    ) -> Result<BeneficiaryResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let merchant_id = self.target_merchant(principal, payload).await?;
        let outcome = self.pay_out(merchant_id).await;
        self.ctx.metrics.payout(outcome.is_ok());

        let mut beneficiary = outcome?;
        if beneficiary.merchant_name.is_none() {
            beneficiary = self.ctx.reconciler.beneficiary(beneficiary.id).await?;
        }
        Ok(beneficiary_response(&beneficiary))
    }

    async fn pay_out(&self, merchant_id: MerchantId) -> Result<Beneficiary> {
        let merchant = self
            .ctx
            .repo
            .find_merchant(&ProfileKey::Id(merchant_id))
            .await?
            .ok_or_else(|| PaymentError::bad_request("merchant not found"))?;

        let account = self
            .ctx
            .repo
            .find_account(&AccountQuery::by_owner(merchant.user_id.as_str()))
            .await?
            .ok_or_else(|| {
                warn!(merchant_id = %merchant_id, "Payout for a merchant without an account");
                PaymentError::bad_request("merchant account not found")
            })?;

        self.ctx.engine.pay_out(merchant.id, account.id).await
    }
}
