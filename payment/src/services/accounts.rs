//! Account service.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, error, info, instrument, warn};

use sp_payment_common::{AccountId, AccountType, PaymentError, RequestPrincipal, Result, Role};
use sp_payment_crypto::{hash_pin, verify_pin};
use sp_payment_ledger::{
    Account, AccountFilter, AccountQuery, AccountUpdate, CreateAccountOutcome, NewAccount,
    SealedNumber,
};

use crate::dto::{AccountPayload, AccountResponse, AccountsQuery, ListAccountResponse, PinPayload};
use crate::identity::UserProfile;

use super::ServiceContext;

const ACCOUNT_NO_MIN: u32 = 10_000_000;
const ACCOUNT_NO_MAX: u32 = 99_999_999;

/// Account number draws before giving up.
const MAX_NUMBER_ATTEMPTS: usize = 10;

/// Account CRUD, lookups and PIN checks.
pub struct AccountService {
    ctx: Arc<ServiceContext>,
}

impl AccountService {
    /// Create a new account service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    fn response(
        &self,
        account: &Account,
        account_no: String,
        with_balance: bool,
    ) -> AccountResponse {
        AccountResponse {
            id: account.id.to_string(),
            owner_id: account.owner_id.clone(),
            owner_name: self.ctx.owner_name(account.owner_name.as_ref()),
            account_type: account.account_type.code(),
            balance: with_balance.then_some(account.balance),
            account_no,
        }
    }

    /// Verify and decrypt an account served on its own.
    fn open_account(&self, account: &Account, with_balance: bool) -> Result<AccountResponse> {
        self.ctx.verify_row(
            "accounts",
            &account.id,
            &account.sealed_fields(),
            account.row_hash.as_deref(),
        )?;
        let account_no = self.ctx.open("accounts", &account.account_no)?;
        Ok(self.response(account, account_no, with_balance))
    }

    /// Encrypt an account number, hash it for lookups and stamp the row.
    fn seal_number(&self, account_no: &str) -> Result<SealedNumber> {
        let mut sealer = self.ctx.cipher.sealer();
        let sealed = sealer.seal(account_no.as_bytes())?;
        let row_hash = sealer.finish()?;

        Ok(SealedNumber {
            account_no: sealed,
            account_no_hash: self.ctx.cipher.lookup_hash(account_no.as_bytes())?,
            row_hash,
        })
    }

    /// List accounts. Balances are not included.
    #[instrument(skip(self, principal, query), fields(user_id = %principal.user_id))]
    pub async fn list_accounts(
        &self,
        principal: &RequestPrincipal,
        query: &AccountsQuery,
    ) -> Result<ListAccountResponse> {
        principal.ensure(&[Role::Admin, Role::Customer])?;

        let account_type = query
            .account_type
            .map(|code| {
                AccountType::from_code(code.into())
                    .ok_or_else(|| PaymentError::bad_request("unknown account type"))
            })
            .transpose()?;
        let filter = AccountFilter {
            owner_id: None,
            account_type,
            keyword: query.keyword().map(str::to_string),
        };
        let page = query.page.pagination();

        let total = self.ctx.repo.count_accounts(&filter).await?;
        if total == 0 {
            return Ok(ListAccountResponse {
                accounts: Vec::new(),
                meta: page.meta(0),
            });
        }

        let rows = self.ctx.repo.find_accounts(&filter, page).await?;
        let accounts = rows
            .iter()
            .map(|account| {
                self.ctx.check_listed_row(
                    "accounts",
                    &account.id,
                    &account.sealed_fields(),
                    account.row_hash.as_deref(),
                );
                let account_no = self.ctx.open_listed("accounts", &account.account_no);
                self.response(account, account_no, false)
            })
            .collect();

        Ok(ListAccountResponse {
            accounts,
            meta: page.meta(total),
        })
    }

    /// One account. Customers and merchants only see their own.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_account(
        &self,
        principal: &RequestPrincipal,
        id: AccountId,
    ) -> Result<AccountResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;

        let mut query = AccountQuery::by_id(id);
        if principal.is_owner_scoped() {
            query = query.owned_by(principal.user_id.as_str());
        }

        let account = self
            .ctx
            .repo
            .find_account(&query)
            .await?
            .ok_or(PaymentError::NotFound)?;
        self.open_account(&account, true)
    }

    /// Look up an account by its plaintext number. The balance is not included.
    #[instrument(skip(self, principal, account_no), fields(user_id = %principal.user_id))]
    pub async fn get_account_by_no(
        &self,
        principal: &RequestPrincipal,
        account_no: &str,
    ) -> Result<AccountResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;

        let hash = self.ctx.cipher.lookup_hash(account_no.trim().as_bytes())?;
        let account = self
            .ctx
            .repo
            .find_account(&AccountQuery::by_number_hash(hash))
            .await?
            .ok_or(PaymentError::NotFound)?;
        self.open_account(&account, false)
    }

    /// The caller's own account.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_account_me(&self, principal: &RequestPrincipal) -> Result<AccountResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;

        let account = self
            .ctx
            .own_account(principal)
            .await?
            .ok_or(PaymentError::NotFound)?;
        self.open_account(&account, true)
    }

    async fn resolve_owner(
        &self,
        principal: &RequestPrincipal,
        payload: &AccountPayload,
    ) -> Result<UserProfile> {
        let found = if principal.is_owner_scoped() {
            self.ctx.identity.find_me(principal).await
        } else {
            let owner_id = payload.owner_id.trim();
            if owner_id.is_empty() {
                return Err(PaymentError::MissingRequiredAttribute("owner_id"));
            }
            self.ctx.identity.find_user(principal, owner_id).await
        };

        found.map_err(|e| match e {
            PaymentError::NotFound => {
                warn!(owner_id = %payload.owner_id, "Account owner not found");
                PaymentError::bad_request("account owner not found")
            }
            other => other,
        })
    }

    /// Open an account. Admins open one for `owner_id`, everyone else for themselves.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn create_account(
        &self,
        principal: &RequestPrincipal,
        payload: &AccountPayload,
    ) -> Result<AccountResponse> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;
        payload.validate()?;

        let owner = self.resolve_owner(principal, payload).await?;
        let account_type = if owner.role() == Some(Role::Customer) {
            AccountType::Customer
        } else {
            AccountType::Merchant
        };

        if self
            .ctx
            .repo
            .find_account(&AccountQuery::by_owner(owner.user_id.as_str()))
            .await?
            .is_some()
        {
            return Err(PaymentError::DuplicatedResource);
        }

        let pin = hash_pin(&payload.pin)?;

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let account_no = rand::thread_rng()
                .gen_range(ACCOUNT_NO_MIN..=ACCOUNT_NO_MAX)
                .to_string();
            let account = NewAccount {
                id: AccountId::new(),
                owner_id: owner.user_id.clone(),
                account_type,
                number: self.seal_number(&account_no)?,
                pin: pin.clone(),
            };

            match self.ctx.repo.create_account(&account).await? {
                CreateAccountOutcome::Created(record) => {
                    info!(
                        account_id = %record.id,
                        owner_id = %record.owner_id,
                        account_type = ?record.account_type,
                        "Account created"
                    );
                    return Ok(self.response(&record, account_no, true));
                }
                CreateAccountOutcome::NumberTaken => {
                    debug!(attempt, "Account number taken, drawing another");
                }
            }
        }

        error!(owner_id = %owner.user_id, "Could not allocate an account number");
        Err(PaymentError::Unknown(
            "could not allocate an account number".to_string(),
        ))
    }

    async fn owned_account(&self, principal: &RequestPrincipal, id: AccountId) -> Result<Account> {
        let account = self
            .ctx
            .repo
            .find_account(&AccountQuery::by_id(id))
            .await?
            .ok_or(PaymentError::NotFound)?;

        if principal.is_owner_scoped() && !account.is_owned_by(&principal.user_id) {
            return Err(PaymentError::NoAccess);
        }
        Ok(account)
    }

    /// Replace the account number and/or PIN. The balance is not writable here.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn update_account(
        &self,
        principal: &RequestPrincipal,
        id: AccountId,
        payload: &AccountPayload,
    ) -> Result<()> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;
        self.owned_account(principal, id).await?;

        let number = payload
            .account_no()
            .map(|account_no| self.seal_number(account_no))
            .transpose()?;
        let pin = payload.pin().map(hash_pin).transpose()?;
        if number.is_none() && pin.is_none() {
            debug!(account_id = %id, "Nothing to update");
            return Ok(());
        }

        self.ctx
            .repo
            .update_account(&AccountUpdate { id, number, pin })
            .await?;

        info!(account_id = %id, "Account updated");
        Ok(())
    }

    /// Tombstone an account.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn delete_account(&self, principal: &RequestPrincipal, id: AccountId) -> Result<()> {
        principal.ensure(&[Role::Admin, Role::Customer, Role::Merchant])?;
        self.owned_account(principal, id).await?;

        self.ctx.repo.delete_account(id).await?;
        info!(account_id = %id, "Account deleted");
        Ok(())
    }

    /// Check the caller's account number and PIN. Every failure is `NoAccess`.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn authenticate_pin(
        &self,
        principal: &RequestPrincipal,
        payload: &PinPayload,
    ) -> Result<()> {
        principal.ensure(&[Role::Customer, Role::Merchant])?;
        payload.validate()?;

        let Some(account) = self.ctx.own_account(principal).await? else {
            warn!("PIN check without an account");
            return Err(PaymentError::NoAccess);
        };

        let hash = self.ctx.cipher.lookup_hash(payload.account_no.trim().as_bytes())?;
        if hash != account.account_no_hash {
            warn!(account_id = %account.id, "PIN check with a foreign account number");
            return Err(PaymentError::NoAccess);
        }

        if !verify_pin(&payload.pin, &account.pin) {
            warn!(account_id = %account.id, "PIN mismatch");
            return Err(PaymentError::NoAccess);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Fixture;
    use sp_payment_ledger::AccountRepository;

    fn pin_only(pin: &str) -> AccountPayload {
        AccountPayload {
            pin: pin.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_for_self_and_duplicate() {
        let fx = Fixture::new();
        let (customer, account) = fx.customer("c-1", "Siti Rahma").await;

        assert_eq!(account.owner_id, "c-1");
        assert_eq!(account.account_type, AccountType::Customer.code());
        assert_eq!(account.account_no.len(), 8);
        assert!(account.account_no.chars().all(|c| c.is_ascii_digit()));

        let second = fx.services.accounts.create_account(&customer, &pin_only("111111")).await;
        assert_eq!(second, Err(PaymentError::DuplicatedResource));
    }

    #[tokio::test]
    async fn test_admin_creates_for_owner() {
        let fx = Fixture::new();
        let admin = fx.admin();
        fx.user("m-9", Role::Merchant);

        let payload = AccountPayload {
            owner_id: "m-9".to_string(),
            pin: "222222".to_string(),
            account_no: None,
        };
        let account = fx.services.accounts.create_account(&admin, &payload).await.unwrap();
        assert_eq!(account.owner_id, "m-9");
        assert_eq!(account.account_type, AccountType::Merchant.code());

        let unknown = AccountPayload {
            owner_id: "ghost".to_string(),
            ..payload.clone()
        };
        assert!(matches!(
            fx.services.accounts.create_account(&admin, &unknown).await,
            Err(PaymentError::BadRequest(_))
        ));

        let missing = AccountPayload {
            owner_id: String::new(),
            ..payload
        };
        assert_eq!(
            fx.services.accounts.create_account(&admin, &missing).await,
            Err(PaymentError::MissingRequiredAttribute("owner_id"))
        );
    }

    #[tokio::test]
    async fn test_reads_are_owner_scoped() {
        let fx = Fixture::new();
        let (alice, alice_acc) = fx.customer("c-1", "Alice").await;
        let (_, bob_acc) = fx.customer("c-2", "Bob").await;
        let alice_id = AccountId::parse(&alice_acc.id).unwrap();
        let bob_id = AccountId::parse(&bob_acc.id).unwrap();

        let own = fx.services.accounts.get_account(&alice, alice_id).await.unwrap();
        assert_eq!(own.owner_name, "Alice");
        assert_eq!(own.balance, Some(rust_decimal::Decimal::ZERO));

        assert_eq!(
            fx.services.accounts.get_account(&alice, bob_id).await,
            Err(PaymentError::NotFound)
        );
        assert!(fx.services.accounts.get_account(&fx.admin(), bob_id).await.is_ok());

        let by_no = fx
            .services
            .accounts
            .get_account_by_no(&alice, &bob_acc.account_no)
            .await
            .unwrap();
        assert_eq!(by_no.id, bob_acc.id);
        assert_eq!(by_no.balance, None);

        let me = fx.services.accounts.get_account_me(&alice).await.unwrap();
        assert_eq!(me.account_no, alice_acc.account_no);

        let listed = fx
            .services
            .accounts
            .list_accounts(&fx.admin(), &AccountsQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.meta.total_item, 2);
        assert!(listed.accounts.iter().all(|a| a.balance.is_none()));

        let merchant = fx.user("m-1", Role::Merchant);
        assert_eq!(
            fx.services.accounts.list_accounts(&merchant, &AccountsQuery::default()).await.err(),
            Some(PaymentError::NoAccess)
        );
    }

    #[tokio::test]
    async fn test_tampered_row_is_refused_alone_but_listed() {
        let fx = Fixture::new();
        let (alice, account) = fx.customer("c-1", "Alice").await;
        let id = AccountId::parse(&account.id).unwrap();

        // Replace the number with a validly encrypted one that the stamp does not cover.
        let forged = fx.ctx.cipher.encrypt(b"12345678").unwrap();
        let mut record = fx
            .repo
            .find_account(&AccountQuery::by_id(id))
            .await
            .unwrap()
            .unwrap();
        fx.repo.delete_account(id).await.unwrap();
        record.account_no = forged;
        fx.repo.seed_account(record);

        assert_eq!(
            fx.services.accounts.get_account(&alice, id).await,
            Err(PaymentError::DataIntegrity("accounts".to_string()))
        );

        let listed = fx
            .services
            .accounts
            .list_accounts(&fx.admin(), &AccountsQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.accounts.len(), 1);
        assert_eq!(listed.accounts[0].account_no, "12345678");
        assert_eq!(fx.metrics.snapshot().integrity_violations, 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_ownership() {
        let fx = Fixture::new();
        let (alice, alice_acc) = fx.customer("c-1", "Alice").await;
        let (_, bob_acc) = fx.customer("c-2", "Bob").await;
        let alice_id = AccountId::parse(&alice_acc.id).unwrap();
        let bob_id = AccountId::parse(&bob_acc.id).unwrap();

        let renumber = AccountPayload {
            account_no: Some("55554444".to_string()),
            ..Default::default()
        };
        fx.services
            .accounts
            .update_account(&alice, alice_id, &renumber)
            .await
            .unwrap();
        let me = fx.services.accounts.get_account_me(&alice).await.unwrap();
        assert_eq!(me.account_no, "55554444");

        assert_eq!(
            fx.services.accounts.update_account(&alice, bob_id, &renumber).await,
            Err(PaymentError::NoAccess)
        );
        assert_eq!(
            fx.services.accounts.delete_account(&alice, bob_id).await,
            Err(PaymentError::NoAccess)
        );

        fx.services.accounts.delete_account(&alice, alice_id).await.unwrap();
        assert_eq!(
            fx.services.accounts.get_account_me(&alice).await,
            Err(PaymentError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_authenticate_pin() {
        let fx = Fixture::new();
        let (alice, account) = fx.customer("c-1", "Alice").await;
        let (_, other) = fx.customer("c-2", "Bob").await;

        let check = |account_no: &str, pin: &str| PinPayload {
            account_no: account_no.to_string(),
            pin: pin.to_string(),
        };

        assert!(fx
            .services
            .accounts
            .authenticate_pin(&alice, &check(&account.account_no, Fixture::PIN))
            .await
            .is_ok());
        assert_eq!(
            fx.services
                .accounts
                .authenticate_pin(&alice, &check(&account.account_no, "000000"))
                .await,
            Err(PaymentError::NoAccess)
        );
        assert_eq!(
            fx.services
                .accounts
                .authenticate_pin(&alice, &check(&other.account_no, Fixture::PIN))
                .await,
            Err(PaymentError::NoAccess)
        );
        assert_eq!(
            fx.services
                .accounts
                .authenticate_pin(&fx.admin(), &check(&account.account_no, Fixture::PIN))
                .await,
            Err(PaymentError::NoAccess)
        );
    }
}
