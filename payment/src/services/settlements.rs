//! Settlement service.

use std::sync::Arc;

use tracing::instrument;

use sp_payment_common::{
    time, BeneficiaryId, PaymentError, RequestPrincipal, Result, Role, SettlementId,
};
use sp_payment_ledger::{Settlement, SettlementFilter};

use crate::dto::{
    ListSettlementResponse, PendingSettlementResponse, SettlementResponse, SettlementsQuery,
};

use super::ServiceContext;

pub(crate) fn settlement_response(settlement: &Settlement) -> SettlementResponse {
    SettlementResponse {
        id: settlement.id.value(),
        transaction_id: settlement.transaction_id.value(),
        merchant_id: settlement.merchant_id.to_string(),
        merchant_name: settlement.merchant_name.clone().unwrap_or_default(),
        beneficiary_id: settlement.beneficiary_id.value(),
        amount: settlement.amount,
        settlement_date: time::format_verbose(settlement.settlement_date),
    }
}

/// Read side of merchant settlements.
pub struct SettlementService {
    ctx: Arc<ServiceContext>,
}

impl SettlementService {
    /// Create a new settlement service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// List settlements. Merchants see their own.
    #[instrument(skip(self, principal, query), fields(user_id = %principal.user_id))]
    pub async fn list_settlements(
        &self,
        principal: &RequestPrincipal,
        query: &SettlementsQuery,
    ) -> Result<ListSettlementResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let beneficiary_id = if query.pending_only {
            Some(BeneficiaryId::NONE)
        } else {
            query.beneficiary_id.map(BeneficiaryId::new)
        };
        let filter = SettlementFilter {
            merchant_id: self.ctx.merchant_scope(principal, query.merchant_id()).await?,
            beneficiary_id,
        };

        let (rows, meta) = self
            .ctx
            .reconciler
            .settlements(&filter, query.page.pagination())
            .await?;
        Ok(ListSettlementResponse {
            settlements: rows.iter().map(settlement_response).collect(),
            meta,
        })
    }

    /// One settlement. Merchants only see their own.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_settlement(
        &self,
        principal: &RequestPrincipal,
        id: SettlementId,
    ) -> Result<SettlementResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let settlement = self.ctx.reconciler.settlement(id).await?;
        if let Some(merchant_id) = self.ctx.merchant_scope(principal, None).await? {
            if settlement.merchant_id != merchant_id {
                return Err(PaymentError::NotFound);
            }
        }
        Ok(settlement_response(&settlement))
    }

    /// Sum of a merchant's unclaimed settlements.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn pending_total(
        &self,
        principal: &RequestPrincipal,
        merchant_id: Option<&str>,
    ) -> Result<PendingSettlementResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;

        let merchant_id = self
            .ctx
            .merchant_scope(principal, merchant_id)
            .await?
            .ok_or(PaymentError::MissingRequiredAttribute("merchant_id"))?;
        let amount = self.ctx.reconciler.pending_total(merchant_id).await?;

        Ok(PendingSettlementResponse {
            merchant_id: merchant_id.to_string(),
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::TransactionPayload;
    use crate::services::testing::{dec, Fixture};

    #[tokio::test]
    async fn test_merchant_sees_own_settlements() {
        let fx = Fixture::new();
        let (alice, alice_acc) = fx.customer("c-1", "Alice").await;
        let (kopi, kopi_acc) = fx.merchant("m-1", "Kopi Kita").await;
        let (roti, roti_acc) = fx.merchant("m-2", "Roti Bakar").await;
        fx.fund(&alice_acc, 1000).await;

        for (recipient, nominal) in [(&kopi_acc, 100), (&kopi_acc, 50), (&roti_acc, 30)] {
            fx.services
                .transactions
                .create_p2b(
                    &alice,
                    &TransactionPayload {
                        account_id: alice_acc.id.clone(),
                        recipient_id: recipient.id.clone(),
                        nominal: dec(nominal),
                        description: "order".to_string(),
                        pin: None,
                    },
                )
                .await
                .unwrap();
        }

        let own = fx
            .services
            .settlements
            .list_settlements(&kopi, &SettlementsQuery::default())
            .await
            .unwrap();
        assert_eq!(own.meta.total_item, 2);
        assert!(own.settlements.iter().all(|s| s.merchant_name == "Kopi Kita"));

        let all = fx
            .services
            .settlements
            .list_settlements(&fx.admin(), &SettlementsQuery::default())
            .await
            .unwrap();
        assert_eq!(all.meta.total_item, 3);

        let pending = fx.services.settlements.pending_total(&kopi, None).await.unwrap();
        assert_eq!(pending.amount, dec(150));

        let foreign = own.settlements[0].id;
        assert_eq!(
            fx.services
                .settlements
                .get_settlement(&roti, SettlementId::new(foreign))
                .await,
            Err(PaymentError::NotFound)
        );
        assert!(fx
            .services
            .settlements
            .get_settlement(&kopi, SettlementId::new(foreign))
            .await
            .is_ok());

        assert_eq!(
            fx.services.settlements.pending_total(&fx.admin(), None).await,
            Err(PaymentError::MissingRequiredAttribute("merchant_id"))
        );
        assert_eq!(
            fx.services
                .settlements
                .list_settlements(&alice, &SettlementsQuery::default())
                .await
                .err(),
            Some(PaymentError::NoAccess)
        );
    }
}
