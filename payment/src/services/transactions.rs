//! Transaction service.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use sp_payment_common::{
    time, AccountId, PaymentError, RequestPrincipal, Result, Role, TransactionId, TransactionKind,
    TransactionStatus,
};
use sp_payment_crypto::verify_pin;
use sp_payment_ledger::{AccountQuery, Transaction, TransactionFilter, TransferRequest};

use crate::dto::{
    ListTransactionResponse, TransactionPayload, TransactionResponse, TransactionStatusPayload,
    TransactionsQuery,
};

use super::ServiceContext;

fn parse_account_id(value: &str, field: &str) -> Result<AccountId> {
    AccountId::parse(value.trim())
        .map_err(|_| PaymentError::bad_request(format!("invalid {}", field)))
}

fn parse_day(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(day) => time::parse_date(day)
            .map(Some)
            .ok_or_else(|| PaymentError::bad_request(format!("invalid {}", field))),
        None => Ok(None),
    }
}

/// Transaction history and the three money-moving entry points.
pub struct TransactionService {
    ctx: Arc<ServiceContext>,
}

impl TransactionService {
    /// Create a new transaction service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    pub(crate) fn response(&self, trx: &Transaction) -> TransactionResponse {
        TransactionResponse {
            id: trx.id.value(),
            account_id: trx.sender_id.to_string(),
            account_name: self.ctx.owner_name(trx.sender_name.as_ref()),
            recipient_id: trx.recipient_id.to_string(),
            recipient_name: self.ctx.owner_name(trx.recipient_name.as_ref()),
            trx_type: trx.kind.code(),
            trx_datetime: time::format_verbose(trx.datetime),
            trx_status: trx.status.code(),
            trx_fee: trx.fee,
            nominal: trx.nominal,
            description: trx.description.clone(),
        }
    }

    fn record<T>(&self, outcome: Result<T>) -> Result<T> {
        match &outcome {
            Ok(_) => self.ctx.metrics.transaction_created(),
            Err(_) => self.ctx.metrics.transaction_rejected(),
        }
        outcome
    }

    /// List transactions, newest first. Customers and merchants see their own account's.
    #[instrument(skip(self, principal, query), fields(user_id = %principal.user_id))]
    pub async fn list_transactions(
        &self,
        principal: &RequestPrincipal,
        query: &TransactionsQuery,
    ) -> Result<ListTransactionResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;
        let page = query.page.pagination();
        let empty = || ListTransactionResponse {
            transactions: Vec::new(),
            meta: page.meta(0),
        };

        let account_id = if principal.is_owner_scoped() {
            match self.ctx.own_account(principal).await? {
                Some(account) => Some(account.id),
                None => return Ok(empty()),
            }
        } else {
            query
                .account_id()
                .map(|id| parse_account_id(id, "account_id"))
                .transpose()?
        };

        let kinds = match query.trx_type {
            Some(code) => vec![TransactionKind::from_code(code.into())
                .ok_or_else(|| PaymentError::bad_request("unknown trx_type"))?],
            None => Vec::new(),
        };

        let filter = TransactionFilter {
            account_id,
            kinds,
            date_from: parse_day(query.date_start.as_deref(), "date_start")?,
            date_to: parse_day(query.date_end.as_deref(), "date_end")?,
            keyword: query.keyword().map(str::to_string),
        };

        let total = self.ctx.repo.count_transactions(&filter).await?;
        if total == 0 {
            return Ok(empty());
        }

        let rows = self.ctx.repo.find_transactions(&filter, page).await?;
        Ok(ListTransactionResponse {
            transactions: rows.iter().map(|trx| self.response(trx)).collect(),
            meta: page.meta(total),
        })
    }

    /// One transaction. Customers and merchants only see those on their own account.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_transaction(
        &self,
        principal: &RequestPrincipal,
        id: TransactionId,
    ) -> Result<TransactionResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;

        let trx = self
            .ctx
            .repo
            .find_transaction(id)
            .await?
            .ok_or(PaymentError::NotFound)?;

        if principal.is_owner_scoped() {
            let own = self.ctx.own_account(principal).await?;
            if !own.map_or(false, |account| trx.involves(account.id)) {
                return Err(PaymentError::NotFound);
            }
        }
        Ok(self.response(&trx))
    }

    /// Resolve and authorize the sending account of a customer-initiated movement.
    async fn sender_for(
        &self,
        principal: &RequestPrincipal,
        payload: &TransactionPayload,
    ) -> Result<AccountId> {
        let sender_id = parse_account_id(&payload.account_id, "account_id")?;

        let sender = if principal.is_owner_scoped() {
            let own = self.ctx.own_account(principal).await?;
            match own {
                Some(account) if account.id == sender_id => Some(account),
                _ => {
                    warn!(account_id = %sender_id, "Sender is not the caller's account");
                    return Err(PaymentError::NoAccess);
                }
            }
        } else if payload.pin().is_some() {
            self.ctx.repo.find_account(&AccountQuery::by_id(sender_id)).await?
        } else {
            None
        };

        if let Some(pin) = payload.pin() {
            let verified = sender.map_or(false, |account| verify_pin(pin, &account.pin));
            if !verified {
                warn!(account_id = %sender_id, "PIN mismatch on transaction");
                return Err(PaymentError::NoAccess);
            }
        }
        Ok(sender_id)
    }

    async fn transfer_request(
        &self,
        principal: &RequestPrincipal,
        payload: &TransactionPayload,
        kind: TransactionKind,
    ) -> Result<TransferRequest> {
        payload.validate(kind)?;
        let sender = self.sender_for(principal, payload).await?;
        let recipient = parse_account_id(&payload.recipient_id, "recipient_id")?;
        Ok(TransferRequest::new(
            sender,
            recipient,
            payload.nominal,
            payload.description.trim(),
        ))
    }

    /// Transfer between customer accounts.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn create_p2p(
        &self,
        principal: &RequestPrincipal,
        payload: &TransactionPayload,
    ) -> Result<TransactionResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;

        let outcome = match self
            .transfer_request(principal, payload, TransactionKind::PeerToPeer)
            .await
        {
            Ok(req) => self.ctx.engine.transfer_p2p(&req).await,
            Err(e) => Err(e),
        };
        let trx = self.record(outcome)?;
        Ok(self.response(&trx))
    }

    /// Pay a merchant. The merchant's share is held as a pending settlement.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn create_p2b(
        &self,
        principal: &RequestPrincipal,
        payload: &TransactionPayload,
    ) -> Result<TransactionResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;

        let outcome = match self
            .transfer_request(principal, payload, TransactionKind::PeerToBusiness)
            .await
        {
            Ok(req) => self.ctx.engine.pay_merchant(&req).await,
            Err(e) => Err(e),
        };
        let (trx, _) = self.record(outcome)?;
        Ok(self.response(&trx))
    }

    /// Credit a customer account from the system account.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn create_system(
        &self,
        principal: &RequestPrincipal,
        payload: &TransactionPayload,
    ) -> Result<TransactionResponse> {
        principal.ensure(&[Role::Admin])?;
        payload.validate(TransactionKind::System)?;
        let recipient = parse_account_id(&payload.recipient_id, "recipient_id")?;

        let outcome = self
            .ctx
            .engine
            .issue_system(recipient, payload.nominal, payload.description.trim())
            .await;
        let trx = self.record(outcome)?;
        Ok(self.response(&trx))
    }

    /// Change a transaction's status. Balances are not touched.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn update_transaction(
        &self,
        principal: &RequestPrincipal,
        id: TransactionId,
        payload: &TransactionStatusPayload,
    ) -> Result<()> {
        principal.ensure(&[Role::Admin])?;
        let code = payload.validate()?;
        let status = TransactionStatus::from_code(code.into())
            .ok_or_else(|| PaymentError::bad_request("unknown trx_status"))?;

        self.ctx.repo.update_transaction(id, status).await?;
        info!(trx_id = %id, status = ?status, "Transaction status updated");
        Ok(())
    }

    /// Tombstone a transaction. This is not a reversal.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn delete_transaction(
        &self,
        principal: &RequestPrincipal,
        id: TransactionId,
    ) -> Result<()> {
        principal.ensure(&[Role::Admin])?;

        self.ctx.repo.delete_transaction(id).await?;
        info!(trx_id = %id, "Transaction deleted");
        Ok(())
    }
}
