//! Request payloads, query parameters and response bodies.
//!
//! Payloads validate themselves explicitly; the first empty mandatory field is reported
//! as `MissingRequiredAttribute`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sp_payment_common::{
    ListMeta, Pagination, PaymentError, Result, TransactionKind, MONEY_DECIMAL_PLACES,
};

fn required(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PaymentError::MissingRequiredAttribute(field));
    }
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Page and limit as received.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
}

impl PageParams {
    /// Normalized pagination.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountsQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub account_type: Option<i16>,
    #[serde(flatten)]
    pub page: PageParams,
}

impl AccountsQuery {
    pub fn keyword(&self) -> Option<&str> {
        non_blank(&self.keyword)
    }
}

/// Create or update an account. The balance is never part of this payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPayload {
    /// Owner to create for; only read for admin callers.
    #[serde(default)]
    pub owner_id: String,
    /// Replacement account number on update.
    #[serde(default)]
    pub account_no: Option<String>,
    #[serde(default)]
    pub pin: String,
}

impl AccountPayload {
    /// Fields mandatory on creation.
    pub fn validate(&self) -> Result<()> {
        required(&self.pin, "pin")
    }

    pub fn account_no(&self) -> Option<&str> {
        non_blank(&self.account_no)
    }

    pub fn pin(&self) -> Option<&str> {
        Some(self.pin.as_str()).filter(|p| !p.is_empty())
    }
}

/// Account number and PIN presented by the owner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PinPayload {
    #[serde(default)]
    pub account_no: String,
    #[serde(default)]
    pub pin: String,
}

impl PinPayload {
    pub fn validate(&self) -> Result<()> {
        required(&self.account_no, "account_no")?;
        required(&self.pin, "pin")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub account_type: i16,
    /// Omitted on lookups by account number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    pub account_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListAccountResponse {
    pub accounts: Vec<AccountResponse>,
    pub meta: ListMeta,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub trx_type: Option<i16>,
    #[serde(default)]
    pub account_id: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default)]
    pub date_start: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default)]
    pub date_end: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

impl TransactionsQuery {
    pub fn account_id(&self) -> Option<&str> {
        non_blank(&self.account_id)
    }

    pub fn keyword(&self) -> Option<&str> {
        non_blank(&self.keyword)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPayload {
    /// Sender account; ignored for system-issued transactions.
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub recipient_id: String,
    #[serde(default)]
    pub nominal: Decimal,
    #[serde(default)]
    pub description: String,
    /// Verified against the sender account when present.
    #[serde(default)]
    pub pin: Option<String>,
}

impl TransactionPayload {
    pub fn validate(&self, kind: TransactionKind) -> Result<()> {
        if !kind.is_system_issued() {
            required(&self.account_id, "account_id")?;
        }
        required(&self.recipient_id, "recipient_id")?;
        if self.nominal.is_zero() {
            return Err(PaymentError::MissingRequiredAttribute("nominal"));
        }
        if self.nominal.normalize().scale() > MONEY_DECIMAL_PLACES {
            return Err(PaymentError::bad_request("nominal has more than two decimals"));
        }
        required(&self.description, "description")
    }

    pub fn pin(&self) -> Option<&str> {
        non_blank(&self.pin)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionStatusPayload {
    #[serde(default)]
    pub trx_status: Option<i16>,
}

impl TransactionStatusPayload {
    pub fn validate(&self) -> Result<i16> {
        self.trx_status
            .ok_or(PaymentError::MissingRequiredAttribute("trx_status"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionResponse {
    pub id: u64,
    pub account_id: String,
    pub account_name: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub trx_type: i16,
    pub trx_datetime: String,
    pub trx_status: i16,
    pub trx_fee: Decimal,
    pub nominal: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListTransactionResponse {
    pub transactions: Vec<TransactionResponse>,
    pub meta: ListMeta,
}

// ---------------------------------------------------------------------------
// Settlements and beneficiaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettlementsQuery {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub beneficiary_id: Option<u64>,
    /// Only settlements not yet claimed by a payout.
    #[serde(default)]
    pub pending_only: bool,
    #[serde(flatten)]
    pub page: PageParams,
}

impl SettlementsQuery {
    pub fn merchant_id(&self) -> Option<&str> {
        non_blank(&self.merchant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementResponse {
    pub id: u64,
    pub transaction_id: u64,
    pub merchant_id: String,
    pub merchant_name: String,
    pub beneficiary_id: u64,
    pub amount: Decimal,
    pub settlement_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSettlementResponse {
    pub settlements: Vec<SettlementResponse>,
    pub meta: ListMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSettlementResponse {
    pub merchant_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeneficiariesQuery {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

impl BeneficiariesQuery {
    pub fn merchant_id(&self) -> Option<&str> {
        non_blank(&self.merchant_id)
    }
}

/// Payout request. Admins name the merchant; merchants pay out their own settlements.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeneficiaryPayload {
    #[serde(default)]
    pub merchant_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeneficiaryResponse {
    pub id: u64,
    pub merchant_id: String,
    pub merchant_name: String,
    pub amount: Decimal,
    pub withdrawal_date: String,
    pub status: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListBeneficiaryResponse {
    pub beneficiaries: Vec<BeneficiaryResponse>,
    pub meta: ListMeta,
}

// ---------------------------------------------------------------------------
// Customers and merchants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilesQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

impl ProfilesQuery {
    pub fn keyword(&self) -> Option<&str> {
        non_blank(&self.keyword)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPayload {
    #[serde(default)]
    pub legal_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "birth_date")]
    pub birthdate: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub photo_profile: String,
}

impl CustomerPayload {
    pub fn validate(&self) -> Result<()> {
        required(&self.legal_name, "legal_name")?;
        required(&self.phone, "phone")?;
        required(&self.email, "email")?;
        required(&self.birthdate, "birth_date")?;
        required(&self.address, "address")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerResponse {
    pub id: String,
    pub user_id: String,
    pub legal_name: String,
    pub phone: String,
    pub email: String,
    #[serde(rename = "birth_date")]
    pub birthdate: String,
    pub address: String,
    pub photo_profile: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListCustomerResponse {
    pub customers: Vec<CustomerResponse>,
    pub meta: ListMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pic_name: String,
    #[serde(default)]
    pub pic_email: String,
    #[serde(default)]
    pub pic_phone: String,
    #[serde(default)]
    pub photo_profile: String,
}

impl MerchantPayload {
    pub fn validate(&self) -> Result<()> {
        required(&self.name, "name")?;
        required(&self.phone, "phone")?;
        required(&self.email, "email")?;
        required(&self.address, "address")?;
        required(&self.pic_name, "pic_name")?;
        required(&self.pic_email, "pic_email")?;
        required(&self.pic_phone, "pic_phone")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantResponse {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub pic_name: String,
    pub pic_email: String,
    pub pic_phone: String,
    pub photo_profile: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListMerchantResponse {
    pub merchants: Vec<MerchantResponse>,
    pub meta: ListMeta,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPoint {
    pub key: u32,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionMeta {
    pub sender_name: String,
    pub recipient_name: String,
    pub nominal: Decimal,
    pub trx_date: String,
    pub trx_type: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub peer_trx_count: u64,
    pub merchant_trx_count: u64,
    pub system_trx_count: u64,
    pub total_customers: u64,
    pub total_merchants: u64,
    pub trx_traffic: Vec<GraphPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantDashboard {
    pub account_no: String,
    pub account_balance: Decimal,
    pub trx_count: u64,
    pub trx_nominal: Decimal,
    pub settlement_nominal: Decimal,
    pub beneficiary_nominal: Decimal,
    pub last_trx: Vec<TransactionMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDashboard {
    pub account_no: String,
    pub account_balance: Decimal,
    pub peer_trx_count: u64,
    pub peer_trx_nominal: Decimal,
    pub merchant_trx_count: u64,
    pub merchant_trx_nominal: Decimal,
    pub last_trx: Vec<TransactionMeta>,
}
