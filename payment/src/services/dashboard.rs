//! Role dashboards over the ledger reports.

use std::sync::Arc;

use tracing::instrument;

use sp_payment_common::{
    time, Pagination, PaymentError, RequestPrincipal, Result, Role, TransactionKind,
};
use sp_payment_ledger::{Account, ReportWindow, Transaction, TransactionFilter};

use crate::dto::{AdminDashboard, CustomerDashboard, GraphPoint, MerchantDashboard, TransactionMeta};

use super::ServiceContext;

/// Transactions shown under "last transactions".
const LAST_TRX: u64 = 5;

/// Figures for the admin, merchant and customer home screens.
pub struct DashboardService {
    ctx: Arc<ServiceContext>,
}

impl DashboardService {
    /// Create a new dashboard service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    fn this_month() -> ReportWindow {
        time::month_bounds(time::now()).into()
    }

    async fn own_account(&self, principal: &RequestPrincipal) -> Result<(Account, String)> {
        let account = self
            .ctx
            .own_account(principal)
            .await?
            .ok_or(PaymentError::NotFound)?;

        self.ctx.verify_row(
            "accounts",
            &account.id,
            &account.sealed_fields(),
            account.row_hash.as_deref(),
        )?;
        let account_no = self.ctx.open("accounts", &account.account_no)?;
        Ok((account, account_no))
    }

    async fn last_transactions(
        &self,
        account: &Account,
        kinds: Vec<TransactionKind>,
    ) -> Result<Vec<TransactionMeta>> {
        let filter = TransactionFilter {
            account_id: Some(account.id),
            kinds,
            ..Default::default()
        };
        let rows = self
            .ctx
            .repo
            .find_transactions(&filter, Pagination::new(1, LAST_TRX))
            .await?;

        Ok(rows.iter().map(|trx| self.meta(trx)).collect())
    }

    fn meta(&self, trx: &Transaction) -> TransactionMeta {
        TransactionMeta {
            sender_name: self.ctx.owner_name(trx.sender_name.as_ref()),
            recipient_name: self.ctx.owner_name(trx.recipient_name.as_ref()),
            nominal: trx.nominal,
            trx_date: time::format_date(trx.datetime),
            trx_type: trx.kind.code(),
        }
    }

    /// Platform-wide counts for this month and the nominal of every month of the year.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn admin(&self, principal: &RequestPrincipal) -> Result<AdminDashboard> {
        principal.ensure(&[Role::Admin])?;

        let report = self.ctx.repo.admin_report(Self::this_month()).await?;
        Ok(AdminDashboard {
            peer_trx_count: report.peer_trx_count,
            merchant_trx_count: report.merchant_trx_count,
            system_trx_count: report.system_trx_count,
            total_customers: report.total_customers,
            total_merchants: report.total_merchants,
            trx_traffic: report
                .trx_traffic
                .iter()
                .map(|m| GraphPoint {
                    key: m.month,
                    value: m.nominal,
                })
                .collect(),
        })
    }

    /// This month's takings, settlements and payouts of the caller's store.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn merchant(&self, principal: &RequestPrincipal) -> Result<MerchantDashboard> {
        principal.ensure(&[Role::Merchant])?;

        let merchant = self.ctx.own_merchant(principal).await?;
        let (account, account_no) = self.own_account(principal).await?;
        let report = self
            .ctx
            .repo
            .merchant_report(account.id, merchant.id, Self::this_month())
            .await?;
        let last_trx = self
            .last_transactions(
                &account,
                vec![TransactionKind::PeerToBusiness, TransactionKind::MerchantSystem],
            )
            .await?;

        Ok(MerchantDashboard {
            account_no,
            account_balance: account.balance,
            trx_count: report.incoming.count,
            trx_nominal: report.incoming.nominal,
            settlement_nominal: report.pending_settlement,
            beneficiary_nominal: report.paid_out,
            last_trx,
        })
    }

    /// This month's spending of the caller.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn customer(&self, principal: &RequestPrincipal) -> Result<CustomerDashboard> {
        principal.ensure(&[Role::Customer])?;

        let (account, account_no) = self.own_account(principal).await?;
        let report = self
            .ctx
            .repo
            .customer_report(account.id, Self::this_month())
            .await?;
        let last_trx = self
            .last_transactions(
                &account,
                vec![
                    TransactionKind::PeerToPeer,
                    TransactionKind::PeerToBusiness,
                    TransactionKind::System,
                ],
            )
            .await?;

        Ok(CustomerDashboard {
            account_no,
            account_balance: account.balance,
            peer_trx_count: report.peer.count,
            peer_trx_nominal: report.peer.nominal,
            merchant_trx_count: report.merchant.count,
            merchant_trx_nominal: report.merchant.nominal,
            last_trx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{BeneficiaryPayload, TransactionPayload};
    use crate::services::testing::{dec, Fixture};
    use chrono::Datelike;

    #[tokio::test]
    async fn test_dashboards_after_a_day_of_trading() {
        let fx = Fixture::new();
        let (alice, alice_acc) = fx.customer("c-1", "Alice").await;
        let (_, bob_acc) = fx.customer("c-2", "Bob").await;
        let (kopi, kopi_acc) = fx.merchant("m-1", "Kopi Kita").await;
        fx.fund(&alice_acc, 1000).await;

        let pay = |recipient: &str, nominal: i64| TransactionPayload {
            account_id: alice_acc.id.clone(),
            recipient_id: recipient.to_string(),
            nominal: dec(nominal),
            description: "daily".to_string(),
            pin: None,
        };
        let trx = &fx.services.transactions;
        trx.create_p2p(&alice, &pay(&bob_acc.id, 100)).await.unwrap();
        trx.create_p2b(&alice, &pay(&kopi_acc.id, 200)).await.unwrap();
        trx.create_p2b(&alice, &pay(&kopi_acc.id, 50)).await.unwrap();
        fx.services
            .beneficiaries
            .create_beneficiary(&kopi, &BeneficiaryPayload::default())
            .await
            .unwrap();
        trx.create_p2b(&alice, &pay(&kopi_acc.id, 30)).await.unwrap();

        let admin = fx.services.dashboard.admin(&fx.admin()).await.unwrap();
        assert_eq!(admin.peer_trx_count, 1);
        assert_eq!(admin.merchant_trx_count, 3);
        assert_eq!(admin.system_trx_count, 1);
        assert_eq!(admin.total_customers, 2);
        assert_eq!(admin.total_merchants, 1);
        assert_eq!(admin.trx_traffic.len(), 12);
        let month = time::now().month();
        // Fund, P2P, three P2B and the payout record.
        assert_eq!(admin.trx_traffic[month as usize - 1].value, dec(1000 + 100 + 280 + 250));

        let merchant = fx.services.dashboard.merchant(&kopi).await.unwrap();
        assert_eq!(merchant.account_no, kopi_acc.account_no);
        assert_eq!(merchant.account_balance, dec(-250));
        assert_eq!(merchant.trx_count, 3);
        assert_eq!(merchant.trx_nominal, dec(280));
        assert_eq!(merchant.settlement_nominal, dec(30));
        assert_eq!(merchant.beneficiary_nominal, dec(250));
        assert_eq!(merchant.last_trx.len(), 4);
        assert!(merchant.last_trx.iter().any(|t| t.sender_name == "Alice"));

        let customer = fx.services.dashboard.customer(&alice).await.unwrap();
        assert_eq!(customer.account_balance, dec(1000 - 110 - 308));
        assert_eq!(customer.peer_trx_count, 1);
        assert_eq!(customer.peer_trx_nominal, dec(100));
        assert_eq!(customer.merchant_trx_count, 3);
        assert_eq!(customer.merchant_trx_nominal, dec(280));
        assert_eq!(customer.last_trx.len(), 5);
        assert_eq!(customer.last_trx[0].recipient_name, "Kopi Kita");
    }

    #[tokio::test]
    async fn test_roles() {
        let fx = Fixture::new();
        let (alice, _) = fx.customer("c-1", "Alice").await;

        assert_eq!(
            fx.services.dashboard.admin(&alice).await,
            Err(PaymentError::NoAccess)
        );
        assert_eq!(
            fx.services.dashboard.merchant(&alice).await,
            Err(PaymentError::NoAccess)
        );
        assert_eq!(
            fx.services
                .dashboard
                .customer(&fx.user("c-9", Role::Customer))
                .await,
            Err(PaymentError::NotFound)
        );
    }
}
