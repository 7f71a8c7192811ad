//! PostgreSQL repository.
//!
//! Balance-moving units lock the affected account rows with `FOR UPDATE` in ascending
//! id order and re-check their preconditions under the lock.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use sp_payment_common::{
    AccountId, AccountType, BeneficiaryId, BeneficiaryStatus, Charge, CustomerId, MerchantId,
    Pagination, PaymentError, Result, SettlementId, TransactionId, TransactionKind,
    TransactionStatus,
};

use crate::account::{
    Account, AccountFilter, AccountQuery, AccountUpdate, CreateAccountOutcome, NewAccount,
    OwnerName,
};
use crate::balance::BalanceDelta;
use crate::profile::{Customer, Merchant, ProfileFilter, ProfileKey};
use crate::report::{
    AdminReport, CustomerReport, MerchantReport, MonthlyNominal, ReportWindow, Tally,
};
use crate::repository::{
    AccountRepository, BeneficiaryRepository, CustomerRepository, MerchantRepository,
    ReportRepository, SettlementRepository, TransactionRepository,
};
use crate::settlement::{
    Beneficiary, BeneficiaryFilter, PayoutRequest, Settlement, SettlementFilter,
};
use crate::transaction::{NewSettlement, NewTransaction, Transaction, TransactionFilter};

const UQ_ACCOUNT_NUMBER: &str = "uq_accounts_account_no_hash";
const UQ_ACCOUNT_OWNER: &str = "uq_accounts_owner_id";

/// Pending total of one merchant. The preview and the payout both run this statement.
const PENDING_TOTAL_SQL: &str = "SELECT coalesce(sum(amount), 0) FROM settlements \
     WHERE merchant_id = $1 AND beneficiary_id = 0 AND deleted_at IS NULL";

const ACCOUNT_FROM: &str = " FROM accounts a \
     LEFT JOIN customers c ON c.user_id = a.owner_id AND a.account_type = 1 AND c.deleted_at IS NULL \
     LEFT JOIN merchants m ON m.user_id = a.owner_id AND a.account_type = 2 AND m.deleted_at IS NULL \
     WHERE a.deleted_at IS NULL";

const ACCOUNT_COLUMNS: &str = "SELECT a.id, a.owner_id, a.account_type, a.balance, a.account_no, \
     a.account_no_hash, a.pin, a.row_hash, a.created_at, \
     c.legal_name AS customer_name, m.name AS merchant_name";

const TRANSACTION_SELECT: &str = "SELECT t.id, t.account_id, t.recipient_id, t.trx_type, \
     t.trx_status, t.nominal, t.trx_fee, t.trx_datetime, t.description, \
     c1.legal_name AS sender_customer_name, m1.name AS sender_merchant_name, \
     c2.legal_name AS recipient_customer_name, m2.name AS recipient_merchant_name \
     FROM transactions t \
     LEFT JOIN accounts a1 ON t.account_id = a1.id AND t.trx_type NOT IN (3, 9) \
     LEFT JOIN customers c1 ON c1.user_id = a1.owner_id AND a1.account_type = 1 AND c1.deleted_at IS NULL \
     LEFT JOIN merchants m1 ON m1.user_id = a1.owner_id AND a1.account_type = 2 AND m1.deleted_at IS NULL \
     LEFT JOIN accounts a2 ON t.recipient_id = a2.id \
     LEFT JOIN customers c2 ON c2.user_id = a2.owner_id AND t.trx_type IN (1, 9) AND c2.deleted_at IS NULL \
     LEFT JOIN merchants m2 ON m2.user_id = a2.owner_id AND t.trx_type IN (2, 3) AND m2.deleted_at IS NULL \
     WHERE t.deleted_at IS NULL";

const SETTLEMENT_SELECT: &str = "SELECT s.id, s.transaction_id, s.merchant_id, m.name AS merchant_name, \
     s.beneficiary_id, s.amount, s.settlement_date \
     FROM settlements s LEFT JOIN merchants m ON m.id = s.merchant_id \
     WHERE s.deleted_at IS NULL";

const BENEFICIARY_SELECT: &str = "SELECT b.id, b.merchant_id, m.name AS merchant_name, b.amount, \
     b.withdrawal_date, b.status \
     FROM beneficiaries b LEFT JOIN merchants m ON m.id = b.merchant_id \
     WHERE b.deleted_at IS NULL";

const CUSTOMER_SELECT: &str = "SELECT id, user_id, legal_name, phone, email, birthdate, address, \
     photo_profile, row_hash, created_at FROM customers WHERE deleted_at IS NULL";

const MERCHANT_SELECT: &str = "SELECT id, user_id, name, phone, email, address, pic_name, pic_email, \
     pic_phone, photo_profile, row_hash, created_at FROM merchants WHERE deleted_at IS NULL";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> PaymentError {
    move |e| {
        error!(error = %e, context, "SQL error");
        PaymentError::Database(e.to_string())
    }
}

/// Name of the unique constraint a statement violated, if any.
fn violated_unique(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

fn corrupt(what: &str, code: i16) -> PaymentError {
    PaymentError::Unknown(format!("unknown {} code {}", what, code))
}

fn like(keyword: &str) -> String {
    format!("%{}%", keyword)
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Pagination) {
    qb.push(" LIMIT ")
        .push_bind(page.limit as i64)
        .push(" OFFSET ")
        .push_bind(page.offset() as i64);
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    owner_id: String,
    account_type: i16,
    balance: Decimal,
    account_no: Vec<u8>,
    account_no_hash: Vec<u8>,
    pin: String,
    row_hash: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
    customer_name: Option<Vec<u8>>,
    merchant_name: Option<String>,
}

impl TryFrom<AccountRow> for Account {
    type Error = PaymentError;

    fn try_from(row: AccountRow) -> Result<Self> {
        let account_type = AccountType::from_code(row.account_type.into())
            .ok_or_else(|| corrupt("account type", row.account_type))?;
        let owner_name = row
            .customer_name
            .map(OwnerName::Sealed)
            .or(row.merchant_name.map(OwnerName::Plain));

        Ok(Account {
            id: AccountId::from_uuid(row.id),
            owner_id: row.owner_id,
            account_type,
            balance: row.balance,
            account_no: row.account_no,
            account_no_hash: row.account_no_hash,
            pin: row.pin,
            row_hash: row.row_hash,
            owner_name,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    account_id: Uuid,
    recipient_id: Uuid,
    trx_type: i16,
    trx_status: i16,
    nominal: Decimal,
    trx_fee: Decimal,
    trx_datetime: DateTime<Utc>,
    description: String,
    sender_customer_name: Option<Vec<u8>>,
    sender_merchant_name: Option<String>,
    recipient_customer_name: Option<Vec<u8>>,
    recipient_merchant_name: Option<String>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PaymentError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let kind = TransactionKind::from_code(row.trx_type.into())
            .ok_or_else(|| corrupt("transaction kind", row.trx_type))?;
        let status = TransactionStatus::from_code(row.trx_status.into())
            .ok_or_else(|| corrupt("transaction status", row.trx_status))?;

        Ok(Transaction {
            id: TransactionId::from_i64(row.id),
            sender_id: AccountId::from_uuid(row.account_id),
            recipient_id: AccountId::from_uuid(row.recipient_id),
            kind,
            status,
            nominal: row.nominal,
            fee: row.trx_fee,
            datetime: row.trx_datetime,
            description: row.description,
            sender_name: row
                .sender_customer_name
                .map(OwnerName::Sealed)
                .or(row.sender_merchant_name.map(OwnerName::Plain)),
            recipient_name: row
                .recipient_customer_name
                .map(OwnerName::Sealed)
                .or(row.recipient_merchant_name.map(OwnerName::Plain)),
        })
    }
}

#[derive(sqlx::FromRow)]
struct SettlementRow {
    id: i64,
    transaction_id: i64,
    merchant_id: Uuid,
    merchant_name: Option<String>,
    beneficiary_id: i64,
    amount: Decimal,
    settlement_date: DateTime<Utc>,
}

impl From<SettlementRow> for Settlement {
    fn from(row: SettlementRow) -> Self {
        Settlement {
            id: SettlementId::from_i64(row.id),
            transaction_id: TransactionId::from_i64(row.transaction_id),
            merchant_id: MerchantId::from_uuid(row.merchant_id),
            merchant_name: row.merchant_name,
            beneficiary_id: BeneficiaryId::from_i64(row.beneficiary_id),
            amount: row.amount,
            settlement_date: row.settlement_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BeneficiaryRow {
    id: i64,
    merchant_id: Uuid,
    merchant_name: Option<String>,
    amount: Decimal,
    withdrawal_date: Option<DateTime<Utc>>,
    status: i16,
}

impl TryFrom<BeneficiaryRow> for Beneficiary {
    type Error = PaymentError;

    fn try_from(row: BeneficiaryRow) -> Result<Self> {
        Ok(Beneficiary {
            id: BeneficiaryId::from_i64(row.id),
            merchant_id: MerchantId::from_uuid(row.merchant_id),
            merchant_name: row.merchant_name,
            amount: row.amount,
            withdrawal_date: row.withdrawal_date,
            status: BeneficiaryStatus::from_code(row.status.into())
                .ok_or_else(|| corrupt("beneficiary status", row.status))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    user_id: String,
    legal_name: Vec<u8>,
    phone: Vec<u8>,
    email: Vec<u8>,
    birthdate: Vec<u8>,
    address: Vec<u8>,
    photo_profile: String,
    row_hash: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_uuid(row.id),
            user_id: row.user_id,
            legal_name: row.legal_name,
            phone: row.phone,
            email: row.email,
            birthdate: row.birthdate,
            address: row.address,
            photo_profile: row.photo_profile,
            row_hash: row.row_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MerchantRow {
    id: Uuid,
    user_id: String,
    name: String,
    phone: String,
    email: String,
    address: String,
    pic_name: Vec<u8>,
    pic_email: Vec<u8>,
    pic_phone: Vec<u8>,
    photo_profile: String,
    row_hash: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl From<MerchantRow> for Merchant {
    fn from(row: MerchantRow) -> Self {
        Merchant {
            id: MerchantId::from_uuid(row.id),
            user_id: row.user_id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            address: row.address,
            pic_name: row.pic_name,
            pic_email: row.pic_email,
            pic_phone: row.pic_phone,
            photo_profile: row.photo_profile,
            row_hash: row.row_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LockedAccount {
    id: Uuid,
    balance: Decimal,
}

/// Lock live account rows in ascending id order.
async fn lock_accounts(conn: &mut PgConnection, ids: &[AccountId]) -> Result<Vec<LockedAccount>> {
    let mut ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    ids.sort();
    ids.dedup();

    sqlx::query_as::<_, LockedAccount>(
        "SELECT id, balance FROM accounts WHERE id = ANY($1) AND deleted_at IS NULL \
         ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("lock accounts"))
}

fn locked(rows: &[LockedAccount], id: AccountId) -> Option<&LockedAccount> {
    rows.iter().find(|r| r.id == *id.as_uuid())
}

fn ensure_covered(rows: &[LockedAccount], id: AccountId, charge: &Charge) -> Result<()> {
    let sender =
        locked(rows, id).ok_or_else(|| PaymentError::bad_request("sender account not found"))?;

    if !charge.is_covered_by(sender.balance) {
        return Err(PaymentError::InsufficientBalance {
            required: charge.required,
            available: sender.balance,
        });
    }
    Ok(())
}

/// `balance = balance - delta`; a negative delta credits the account.
async fn adjust_balance(conn: &mut PgConnection, id: AccountId, delta: BalanceDelta) -> Result<()> {
    let done = sqlx::query(
        "UPDATE accounts SET balance = balance - $1, updated_at = now() \
         WHERE id = $2 AND deleted_at IS NULL",
    )
    .bind(delta.value())
    .bind(*id.as_uuid())
    .execute(&mut *conn)
    .await
    .map_err(db_error("adjust balance"))?;

    if done.rows_affected() == 0 {
        return Err(PaymentError::NotFound);
    }
    Ok(())
}

async fn insert_transaction(conn: &mut PgConnection, trx: &NewTransaction) -> Result<()> {
    sqlx::query(
        "INSERT INTO transactions \
         (id, account_id, recipient_id, trx_type, trx_datetime, trx_status, trx_fee, nominal, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(trx.id.as_i64())
    .bind(*trx.sender_id.as_uuid())
    .bind(*trx.recipient_id.as_uuid())
    .bind(trx.kind.code())
    .bind(trx.datetime)
    .bind(trx.status.code())
    .bind(trx.charge.fee)
    .bind(trx.charge.nominal)
    .bind(&trx.description)
    .execute(&mut *conn)
    .await
    .map_err(db_error("insert transaction"))?;
    Ok(())
}

/// Repository backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Create a repository over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_error("connect"))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Migration failed");
                PaymentError::Database(e.to_string())
            })?;
        info!("Migrations applied");
        Ok(())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn push_account_query<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &AccountQuery) {
        if let Some(id) = query.id {
            qb.push(" AND a.id = ").push_bind(*id.as_uuid());
        }
        if let Some(owner) = &query.owner_id {
            qb.push(" AND a.owner_id = ").push_bind(owner.clone());
        }
        if let Some(hash) = &query.account_no_hash {
            qb.push(" AND a.account_no_hash = ").push_bind(hash.clone());
        }
    }

    fn push_account_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &AccountFilter) {
        if let Some(owner) = &filter.owner_id {
            qb.push(" AND a.owner_id = ").push_bind(owner.clone());
        }
        if let Some(account_type) = filter.account_type {
            qb.push(" AND a.account_type = ").push_bind(account_type.code());
        }
        if let Some(keyword) = &filter.keyword {
            qb.push(" AND m.name ILIKE ").push_bind(like(keyword));
        }
    }

    fn push_transaction_filter<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        filter: &TransactionFilter,
    ) {
        if let Some(id) = filter.account_id {
            let id = *id.as_uuid();
            qb.push(" AND (t.account_id = ")
                .push_bind(id)
                .push(" OR t.recipient_id = ")
                .push_bind(id)
                .push(")");
        }
        if !filter.kinds.is_empty() {
            let codes: Vec<i16> = filter.kinds.iter().map(|k| k.code()).collect();
            qb.push(" AND t.trx_type = ANY(").push_bind(codes).push(")");
        }
        if let Some(from) = filter.date_from {
            qb.push(" AND date(t.trx_datetime) >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            qb.push(" AND date(t.trx_datetime) <= ").push_bind(to);
        }
        if let Some(keyword) = &filter.keyword {
            qb.push(" AND t.description ILIKE ").push_bind(like(keyword));
        }
    }

    fn push_settlement_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &SettlementFilter) {
        if let Some(merchant) = filter.merchant_id {
            qb.push(" AND s.merchant_id = ").push_bind(*merchant.as_uuid());
        }
        if let Some(beneficiary) = filter.beneficiary_id {
            qb.push(" AND s.beneficiary_id = ").push_bind(beneficiary.as_i64());
        }
    }

    fn push_customer_key<'a>(qb: &mut QueryBuilder<'a, Postgres>, key: &ProfileKey<CustomerId>) {
        match key {
            ProfileKey::Id(id) => qb.push(" AND id = ").push_bind(*id.as_uuid()),
            ProfileKey::User(user) => qb.push(" AND user_id = ").push_bind(user.clone()),
        };
    }

    fn push_merchant_key<'a>(qb: &mut QueryBuilder<'a, Postgres>, key: &ProfileKey<MerchantId>) {
        match key {
            ProfileKey::Id(id) => qb.push(" AND id = ").push_bind(*id.as_uuid()),
            ProfileKey::User(user) => qb.push(" AND user_id = ").push_bind(user.clone()),
        };
    }
}

#[async_trait]
impl AccountRepository for PgRepository {
    #[instrument(skip(self))]
    async fn find_account(&self, query: &AccountQuery) -> Result<Option<Account>> {
        let mut qb = QueryBuilder::new(ACCOUNT_COLUMNS);
        qb.push(ACCOUNT_FROM);
        Self::push_account_query(&mut qb, query);
        qb.push(" LIMIT 1");

        qb.build_query_as::<AccountRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find account"))?
            .map(Account::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_accounts(
        &self,
        filter: &AccountFilter,
        page: Pagination,
    ) -> Result<Vec<Account>> {
        let mut qb = QueryBuilder::new(ACCOUNT_COLUMNS);
        qb.push(ACCOUNT_FROM);
        Self::push_account_filter(&mut qb, filter);
        qb.push(" ORDER BY a.created_at DESC");
        push_page(&mut qb, page);

        qb.build_query_as::<AccountRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find accounts"))?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn count_accounts(&self, filter: &AccountFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT count(*)");
        qb.push(ACCOUNT_FROM);
        Self::push_account_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count accounts"))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn create_account(&self, account: &NewAccount) -> Result<CreateAccountOutcome> {
        let created_at = sp_payment_common::time::now();
        let result = sqlx::query(
            "INSERT INTO accounts \
             (id, owner_id, account_type, balance, account_no, account_no_hash, pin, row_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, 0, $4, $5, $6, $7, $8, $8)",
        )
        .bind(*account.id.as_uuid())
        .bind(&account.owner_id)
        .bind(account.account_type.code())
        .bind(&account.number.account_no)
        .bind(&account.number.account_no_hash)
        .bind(&account.pin)
        .bind(&account.number.row_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(CreateAccountOutcome::Created(account.to_record(created_at))),
            Err(e) => match violated_unique(&e).as_deref() {
                Some(UQ_ACCOUNT_NUMBER) => Ok(CreateAccountOutcome::NumberTaken),
                Some(UQ_ACCOUNT_OWNER) => Err(PaymentError::DuplicatedResource),
                _ => Err(db_error("create account")(e)),
            },
        }
    }

    #[instrument(skip(self, update), fields(account_id = %update.id))]
    async fn update_account(&self, update: &AccountUpdate) -> Result<()> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE accounts SET updated_at = now()");
        if let Some(number) = &update.number {
            qb.push(", account_no = ")
                .push_bind(number.account_no.clone())
                .push(", account_no_hash = ")
                .push_bind(number.account_no_hash.clone())
                .push(", row_hash = ")
                .push_bind(number.row_hash.clone());
        }
        if let Some(pin) = &update.pin {
            qb.push(", pin = ").push_bind(pin.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(*update.id.as_uuid())
            .push(" AND deleted_at IS NULL");

        let done = match qb.build().execute(&self.pool).await {
            Ok(done) => done,
            Err(e) if violated_unique(&e).as_deref() == Some(UQ_ACCOUNT_NUMBER) => {
                return Err(PaymentError::bad_request("account number already in use"));
            }
            Err(e) => return Err(db_error("update account")(e)),
        };

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: AccountId) -> Result<()> {
        let done = sqlx::query(
            "UPDATE accounts SET updated_at = now(), deleted_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(*id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("delete account"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for PgRepository {
    #[instrument(skip(self))]
    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let mut qb = QueryBuilder::new(TRANSACTION_SELECT);
        qb.push(" AND t.id = ").push_bind(id.as_i64());

        qb.build_query_as::<TransactionRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find transaction"))?
            .map(Transaction::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<Transaction>> {
        let mut qb = QueryBuilder::new(TRANSACTION_SELECT);
        Self::push_transaction_filter(&mut qb, filter);
        qb.push(" ORDER BY t.trx_datetime DESC, t.id DESC");
        push_page(&mut qb, page);

        qb.build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find transactions"))?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn count_transactions(&self, filter: &TransactionFilter) -> Result<u64> {
        let mut qb =
            QueryBuilder::new("SELECT count(*) FROM transactions t WHERE t.deleted_at IS NULL");
        Self::push_transaction_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count transactions"))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, trx), fields(trx_id = %trx.id, charge = %trx.charge))]
    async fn create_transaction_p2p(&self, trx: &NewTransaction) -> Result<Transaction> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let rows = lock_accounts(&mut tx, &[trx.sender_id, trx.recipient_id]).await?;
        ensure_covered(&rows, trx.sender_id, &trx.charge)?;
        if locked(&rows, trx.recipient_id).is_none() {
            return Err(PaymentError::bad_request("recipient account not found"));
        }

        // Debit the sender by nominal plus fee, credit the recipient by nominal.
        adjust_balance(&mut tx, trx.sender_id, BalanceDelta::debit(trx.charge.total())).await?;
        adjust_balance(&mut tx, trx.recipient_id, BalanceDelta::credit(trx.charge.nominal)).await?;
        insert_transaction(&mut tx, trx).await?;

        tx.commit().await.map_err(db_error("commit p2p"))?;
        Ok(trx.to_record())
    }

    #[instrument(skip(self, trx, settlement), fields(trx_id = %trx.id, charge = %trx.charge))]
    async fn create_transaction_p2b(
        &self,
        trx: &NewTransaction,
        settlement: &NewSettlement,
    ) -> Result<(Transaction, Settlement)> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let rows = lock_accounts(&mut tx, &[trx.sender_id]).await?;
        ensure_covered(&rows, trx.sender_id, &trx.charge)?;

        // The merchant is paid through its settlement, not credited here.
        adjust_balance(&mut tx, trx.sender_id, BalanceDelta::debit(trx.charge.total())).await?;
        insert_transaction(&mut tx, trx).await?;

        sqlx::query(
            "INSERT INTO settlements (id, transaction_id, merchant_id, beneficiary_id, amount, settlement_date) \
             VALUES ($1, $2, $3, 0, $4, $5)",
        )
        .bind(settlement.id.as_i64())
        .bind(trx.id.as_i64())
        .bind(*settlement.merchant_id.as_uuid())
        .bind(settlement.amount)
        .bind(settlement.settlement_date)
        .execute(&mut *tx)
        .await
        .map_err(db_error("insert settlement"))?;

        tx.commit().await.map_err(db_error("commit p2b"))?;

        let pending = Settlement {
            id: settlement.id,
            transaction_id: trx.id,
            merchant_id: settlement.merchant_id,
            merchant_name: None,
            beneficiary_id: BeneficiaryId::NONE,
            amount: settlement.amount,
            settlement_date: settlement.settlement_date,
        };
        Ok((trx.to_record(), pending))
    }

    #[instrument(skip(self, trx), fields(trx_id = %trx.id, charge = %trx.charge))]
    async fn create_transaction_system(&self, trx: &NewTransaction) -> Result<Transaction> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let rows = lock_accounts(&mut tx, &[trx.recipient_id]).await?;
        if locked(&rows, trx.recipient_id).is_none() {
            return Err(PaymentError::bad_request("recipient account not found"));
        }

        adjust_balance(&mut tx, trx.recipient_id, BalanceDelta::credit(trx.charge.nominal)).await?;
        insert_transaction(&mut tx, trx).await?;

        tx.commit().await.map_err(db_error("commit system"))?;
        Ok(trx.to_record())
    }

    #[instrument(skip(self))]
    async fn update_transaction(&self, id: TransactionId, status: TransactionStatus) -> Result<()> {
        let done = sqlx::query(
            "UPDATE transactions SET trx_status = $1, updated_at = now() \
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(status.code())
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(db_error("update transaction"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        let done = sqlx::query(
            "UPDATE transactions SET updated_at = now(), deleted_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(db_error("delete transaction"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SettlementRepository for PgRepository {
    #[instrument(skip(self))]
    async fn find_settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        let mut qb = QueryBuilder::new(SETTLEMENT_SELECT);
        qb.push(" AND s.id = ").push_bind(id.as_i64());

        Ok(qb
            .build_query_as::<SettlementRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find settlement"))?
            .map(Settlement::from))
    }

    #[instrument(skip(self))]
    async fn find_settlements(
        &self,
        filter: &SettlementFilter,
        page: Pagination,
    ) -> Result<Vec<Settlement>> {
        let mut qb = QueryBuilder::new(SETTLEMENT_SELECT);
        Self::push_settlement_filter(&mut qb, filter);
        qb.push(" ORDER BY s.settlement_date DESC, s.id DESC");
        push_page(&mut qb, page);

        Ok(qb
            .build_query_as::<SettlementRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find settlements"))?
            .into_iter()
            .map(Settlement::from)
            .collect())
    }

    #[instrument(skip(self))]
    async fn count_settlements(&self, filter: &SettlementFilter) -> Result<u64> {
        let mut qb =
            QueryBuilder::new("SELECT count(*) FROM settlements s WHERE s.deleted_at IS NULL");
        Self::push_settlement_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count settlements"))?;
        Ok(count as u64)
    }

    #[instrument(skip(self))]
    async fn find_pending_settlement(&self, merchant_id: MerchantId) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>(PENDING_TOTAL_SQL)
            .bind(*merchant_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("pending settlement"))
    }
}

#[async_trait]
impl BeneficiaryRepository for PgRepository {
    #[instrument(skip(self))]
    async fn find_beneficiary(&self, id: BeneficiaryId) -> Result<Option<Beneficiary>> {
        let mut qb = QueryBuilder::new(BENEFICIARY_SELECT);
        qb.push(" AND b.id = ").push_bind(id.as_i64());

        qb.build_query_as::<BeneficiaryRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find beneficiary"))?
            .map(Beneficiary::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_beneficiaries(
        &self,
        filter: &BeneficiaryFilter,
        page: Pagination,
    ) -> Result<Vec<Beneficiary>> {
        let mut qb = QueryBuilder::new(BENEFICIARY_SELECT);
        if let Some(merchant) = filter.merchant_id {
            qb.push(" AND b.merchant_id = ").push_bind(*merchant.as_uuid());
        }
        qb.push(" ORDER BY b.id DESC");
        push_page(&mut qb, page);

        qb.build_query_as::<BeneficiaryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find beneficiaries"))?
            .into_iter()
            .map(Beneficiary::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn count_beneficiaries(&self, filter: &BeneficiaryFilter) -> Result<u64> {
        let mut qb =
            QueryBuilder::new("SELECT count(*) FROM beneficiaries b WHERE b.deleted_at IS NULL");
        if let Some(merchant) = filter.merchant_id {
            qb.push(" AND b.merchant_id = ").push_bind(*merchant.as_uuid());
        }

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count beneficiaries"))?;
        Ok(count as u64)
    }

    #[instrument(
        skip(self, payout),
        fields(beneficiary_id = %payout.beneficiary_id, merchant_id = %payout.merchant_id)
    )]
    async fn create_beneficiary(&self, payout: &PayoutRequest) -> Result<Beneficiary> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let rows = lock_accounts(&mut tx, &[payout.merchant_account]).await?;
        if locked(&rows, payout.merchant_account).is_none() {
            return Err(PaymentError::bad_request("merchant account not found"));
        }

        let amount = sqlx::query_scalar::<_, Decimal>(PENDING_TOTAL_SQL)
            .bind(*payout.merchant_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("pending settlement"))?;

        sqlx::query(
            "INSERT INTO beneficiaries (id, merchant_id, amount, withdrawal_date, status) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(payout.beneficiary_id.as_i64())
        .bind(*payout.merchant_id.as_uuid())
        .bind(amount)
        .bind(payout.requested_at)
        .bind(BeneficiaryStatus::Confirmed.code())
        .execute(&mut *tx)
        .await
        .map_err(db_error("insert beneficiary"))?;

        let claimed = sqlx::query_scalar::<_, Decimal>(
            "UPDATE settlements SET beneficiary_id = $1, updated_at = now() \
             WHERE merchant_id = $2 AND beneficiary_id = 0 AND deleted_at IS NULL \
             RETURNING amount",
        )
        .bind(payout.beneficiary_id.as_i64())
        .bind(*payout.merchant_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("claim settlements"))?;

        // Gate: nothing is committed unless settlements back the payout.
        if claimed.is_empty() {
            warn!("No pending settlement, payout rolled back");
            return Err(PaymentError::bad_request("no pending settlement to pay out"));
        }
        if claimed.iter().copied().sum::<Decimal>() != amount {
            warn!(%amount, "Pending settlements changed during payout, rolled back");
            return Err(PaymentError::bad_request("pending settlements changed, retry the payout"));
        }

        // Money leaves the merchant account toward the bank rail.
        adjust_balance(&mut tx, payout.merchant_account, BalanceDelta::debit(amount)).await?;

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
        insert_transaction(&mut tx, &trx).await?;

        tx.commit().await.map_err(db_error("commit payout"))?;
        info!(%amount, settlements = claimed.len(), "Payout committed");

        Ok(Beneficiary {
            id: payout.beneficiary_id,
            merchant_id: payout.merchant_id,
            merchant_name: None,
            amount,
            withdrawal_date: Some(payout.requested_at),
            status: BeneficiaryStatus::Confirmed,
        })
    }
}

#[async_trait]
impl CustomerRepository for PgRepository {
    #[instrument(skip(self))]
    async fn find_customer(&self, key: &ProfileKey<CustomerId>) -> Result<Option<Customer>> {
        let mut qb = QueryBuilder::new(CUSTOMER_SELECT);
        Self::push_customer_key(&mut qb, key);

        Ok(qb
            .build_query_as::<CustomerRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find customer"))?
            .map(Customer::from))
    }

    #[instrument(skip(self))]
    async fn find_customers(
        &self,
        _filter: &ProfileFilter,
        page: Pagination,
    ) -> Result<Vec<Customer>> {
        let mut qb = QueryBuilder::new(CUSTOMER_SELECT);
        qb.push(" ORDER BY created_at DESC");
        push_page(&mut qb, page);

        Ok(qb
            .build_query_as::<CustomerRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find customers"))?
            .into_iter()
            .map(Customer::from)
            .collect())
    }

    #[instrument(skip(self))]
    async fn count_customers(&self, _filter: &ProfileFilter) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM customers WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("count customers"))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn create_customer(&self, customer: &Customer) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO customers \
             (id, user_id, legal_name, phone, email, birthdate, address, photo_profile, row_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)",
        )
        .bind(*customer.id.as_uuid())
        .bind(&customer.user_id)
        .bind(&customer.legal_name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.birthdate)
        .bind(&customer.address)
        .bind(&customer.photo_profile)
        .bind(&customer.row_hash)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if violated_unique(&e).is_some() => Err(PaymentError::DuplicatedResource),
            Err(e) => Err(db_error("create customer")(e)),
        }
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let done = sqlx::query(
            "UPDATE customers SET legal_name = $1, phone = $2, email = $3, birthdate = $4, \
             address = $5, photo_profile = $6, row_hash = $7, updated_at = now() \
             WHERE id = $8 AND deleted_at IS NULL",
        )
        .bind(&customer.legal_name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.birthdate)
        .bind(&customer.address)
        .bind(&customer.photo_profile)
        .bind(&customer.row_hash)
        .bind(*customer.id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("update customer"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_customer(&self, key: &ProfileKey<CustomerId>) -> Result<()> {
        let mut qb = QueryBuilder::new(
            "UPDATE customers SET updated_at = now(), deleted_at = now() WHERE deleted_at IS NULL",
        );
        Self::push_customer_key(&mut qb, key);

        let done = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_error("delete customer"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl MerchantRepository for PgRepository {
    #[instrument(skip(self))]
    async fn find_merchant(&self, key: &ProfileKey<MerchantId>) -> Result<Option<Merchant>> {
        let mut qb = QueryBuilder::new(MERCHANT_SELECT);
        Self::push_merchant_key(&mut qb, key);

        Ok(qb
            .build_query_as::<MerchantRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find merchant"))?
            .map(Merchant::from))
    }

    #[instrument(skip(self))]
    async fn find_merchants(
        &self,
        filter: &ProfileFilter,
        page: Pagination,
    ) -> Result<Vec<Merchant>> {
        let mut qb = QueryBuilder::new(MERCHANT_SELECT);
        if let Some(keyword) = &filter.keyword {
            qb.push(" AND name ILIKE ").push_bind(like(keyword));
        }
        qb.push(" ORDER BY created_at DESC");
        push_page(&mut qb, page);

        Ok(qb
            .build_query_as::<MerchantRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find merchants"))?
            .into_iter()
            .map(Merchant::from)
            .collect())
    }

    #[instrument(skip(self))]
    async fn count_merchants(&self, filter: &ProfileFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT count(*) FROM merchants WHERE deleted_at IS NULL");
        if let Some(keyword) = &filter.keyword {
            qb.push(" AND name ILIKE ").push_bind(like(keyword));
        }

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count merchants"))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, merchant), fields(merchant_id = %merchant.id))]
    async fn create_merchant(&self, merchant: &Merchant) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO merchants \
             (id, user_id, name, phone, email, address, pic_name, pic_email, pic_phone, photo_profile, row_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)",
        )
        .bind(*merchant.id.as_uuid())
        .bind(&merchant.user_id)
        .bind(&merchant.name)
        .bind(&merchant.phone)
        .bind(&merchant.email)
        .bind(&merchant.address)
        .bind(&merchant.pic_name)
        .bind(&merchant.pic_email)
        .bind(&merchant.pic_phone)
        .bind(&merchant.photo_profile)
        .bind(&merchant.row_hash)
        .bind(merchant.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if violated_unique(&e).is_some() => Err(PaymentError::DuplicatedResource),
            Err(e) => Err(db_error("create merchant")(e)),
        }
    }

    #[instrument(skip(self, merchant), fields(merchant_id = %merchant.id))]
    async fn update_merchant(&self, merchant: &Merchant) -> Result<()> {
        let done = sqlx::query(
            "UPDATE merchants SET name = $1, phone = $2, email = $3, address = $4, pic_name = $5, \
             pic_email = $6, pic_phone = $7, photo_profile = $8, row_hash = $9, updated_at = now() \
             WHERE id = $10 AND deleted_at IS NULL",
        )
        .bind(&merchant.name)
        .bind(&merchant.phone)
        .bind(&merchant.email)
        .bind(&merchant.address)
        .bind(&merchant.pic_name)
        .bind(&merchant.pic_email)
        .bind(&merchant.pic_phone)
        .bind(&merchant.photo_profile)
        .bind(&merchant.row_hash)
        .bind(*merchant.id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("update merchant"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_merchant(&self, key: &ProfileKey<MerchantId>) -> Result<()> {
        let mut qb = QueryBuilder::new(
            "UPDATE merchants SET updated_at = now(), deleted_at = now() WHERE deleted_at IS NULL",
        );
        Self::push_merchant_key(&mut qb, key);

        let done = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_error("delete merchant"))?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AdminCounts {
    peer_trx_count: i64,
    merchant_trx_count: i64,
    system_trx_count: i64,
    total_customers: i64,
    total_merchants: i64,
}

#[derive(sqlx::FromRow)]
struct MerchantFigures {
    trx_count: i64,
    trx_nominal: Decimal,
    settlement_nominal: Decimal,
    beneficiary_nominal: Decimal,
}

#[derive(sqlx::FromRow)]
struct CustomerFigures {
    peer_trx_count: i64,
    peer_trx_nominal: Decimal,
    merchant_trx_count: i64,
    merchant_trx_nominal: Decimal,
}

fn year_bounds(year: i32) -> (Option<NaiveDate>, Option<NaiveDate>) {
    (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year + 1, 1, 1),
    )
}

#[async_trait]
impl ReportRepository for PgRepository {
    #[instrument(skip(self))]
    async fn admin_report(&self, window: ReportWindow) -> Result<AdminReport> {
        let counts = sqlx::query_as::<_, AdminCounts>(
            "SELECT \
             (SELECT count(*) FROM transactions WHERE deleted_at IS NULL AND trx_type = 1 \
               AND date(trx_datetime) BETWEEN $1 AND $2) AS peer_trx_count, \
             (SELECT count(*) FROM transactions WHERE deleted_at IS NULL AND trx_type = 2 \
               AND date(trx_datetime) BETWEEN $1 AND $2) AS merchant_trx_count, \
             (SELECT count(*) FROM transactions WHERE deleted_at IS NULL AND trx_type = 9 \
               AND date(trx_datetime) BETWEEN $1 AND $2) AS system_trx_count, \
             (SELECT count(*) FROM customers WHERE deleted_at IS NULL) AS total_customers, \
             (SELECT count(*) FROM merchants WHERE deleted_at IS NULL) AS total_merchants",
        )
        .bind(window.from)
        .bind(window.to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("admin report"))?;

        let (year_start, next_year) = year_bounds(window.from.year());
        let monthly: Vec<(i32, Decimal)> = sqlx::query_as(
            "SELECT CAST(EXTRACT(MONTH FROM trx_datetime) AS INTEGER) AS month, \
             coalesce(sum(nominal), 0) AS nominal \
             FROM transactions WHERE deleted_at IS NULL \
             AND date(trx_datetime) >= $1 AND date(trx_datetime) < $2 \
             GROUP BY 1",
        )
        .bind(year_start)
        .bind(next_year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("admin traffic"))?;

        let trx_traffic = (1..=12u32)
            .map(|month| MonthlyNominal {
                month,
                nominal: monthly
                    .iter()
                    .find(|(m, _)| *m as u32 == month)
                    .map(|(_, n)| *n)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(AdminReport {
            peer_trx_count: counts.peer_trx_count as u64,
            merchant_trx_count: counts.merchant_trx_count as u64,
            system_trx_count: counts.system_trx_count as u64,
            total_customers: counts.total_customers as u64,
            total_merchants: counts.total_merchants as u64,
            trx_traffic,
        })
    }

    #[instrument(skip(self))]
    async fn merchant_report(
        &self,
        account_id: AccountId,
        merchant_id: MerchantId,
        window: ReportWindow,
    ) -> Result<MerchantReport> {
        let figures = sqlx::query_as::<_, MerchantFigures>(
            "SELECT \
             (SELECT count(*) FROM transactions WHERE deleted_at IS NULL AND trx_type = 2 \
               AND recipient_id = $1 AND date(trx_datetime) BETWEEN $3 AND $4) AS trx_count, \
             (SELECT coalesce(sum(nominal), 0) FROM transactions WHERE deleted_at IS NULL AND trx_type = 2 \
               AND recipient_id = $1 AND date(trx_datetime) BETWEEN $3 AND $4) AS trx_nominal, \
             (SELECT coalesce(sum(amount), 0) FROM settlements WHERE deleted_at IS NULL AND beneficiary_id = 0 \
               AND merchant_id = $2 AND date(settlement_date) BETWEEN $3 AND $4) AS settlement_nominal, \
             (SELECT coalesce(sum(amount), 0) FROM beneficiaries WHERE deleted_at IS NULL \
               AND merchant_id = $2 AND date(withdrawal_date) BETWEEN $3 AND $4) AS beneficiary_nominal",
        )
        .bind(*account_id.as_uuid())
        .bind(*merchant_id.as_uuid())
        .bind(window.from)
        .bind(window.to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("merchant report"))?;

        Ok(MerchantReport {
            incoming: Tally {
                count: figures.trx_count as u64,
                nominal: figures.trx_nominal,
            },
            pending_settlement: figures.settlement_nominal,
            paid_out: figures.beneficiary_nominal,
        })
    }

    #[instrument(skip(self))]
    async fn customer_report(
        &self,
        account_id: AccountId,
        window: ReportWindow,
    ) -> Result<CustomerReport> {
        let figures = sqlx::query_as::<_, CustomerFigures>(
            "SELECT \
             (SELECT count(*) FROM transactions WHERE deleted_at IS NULL AND trx_type = 1 \
               AND account_id = $1 AND date(trx_datetime) BETWEEN $2 AND $3) AS peer_trx_count, \
             (SELECT coalesce(sum(nominal), 0) FROM transactions WHERE deleted_at IS NULL AND trx_type = 1 \
               AND account_id = $1 AND date(trx_datetime) BETWEEN $2 AND $3) AS peer_trx_nominal, \
             (SELECT count(*) FROM transactions WHERE deleted_at IS NULL AND trx_type = 2 \
               AND account_id = $1 AND date(trx_datetime) BETWEEN $2 AND $3) AS merchant_trx_count, \
             (SELECT coalesce(sum(nominal), 0) FROM transactions WHERE deleted_at IS NULL AND trx_type = 2 \
               AND account_id = $1 AND date(trx_datetime) BETWEEN $2 AND $3) AS merchant_trx_nominal",
        )
        .bind(*account_id.as_uuid())
        .bind(window.from)
        .bind(window.to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("customer report"))?;

        Ok(CustomerReport {
            peer: Tally {
                count: figures.peer_trx_count as u64,
                nominal: figures.peer_trx_nominal,
            },
            merchant: Tally {
                count: figures.merchant_trx_count as u64,
                nominal: figures.merchant_trx_nominal,
            },
        })
    }
}
