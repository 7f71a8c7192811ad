//! Service fixture over the in-memory repository.

use std::sync::Arc;

use rust_decimal::Decimal;

use sp_payment_common::{AccountId, RequestPrincipal, Role, SnowflakeGenerator};
use sp_payment_crypto::FieldCipher;
use sp_payment_ledger::{AccountQuery, AccountRepository, InMemoryRepository};

use crate::dto::{AccountPayload, AccountResponse, TransactionPayload, TransactionResponse};
use crate::events::{CustomerEvent, MerchantEvent, RecordingPublisher};
use crate::identity::{StaticIdentityClient, UserProfile};
use crate::metrics::Metrics;

use super::{ServiceContext, Services};

pub(crate) fn dec(v: i64) -> Decimal {
    Decimal::new(v, 0)
}

pub(crate) struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub identity: Arc<StaticIdentityClient>,
    pub publisher: Arc<RecordingPublisher>,
    pub metrics: Arc<Metrics>,
    pub ctx: Arc<ServiceContext>,
    pub services: Services,
    pub system_account: AccountId,
}

impl Fixture {
    pub const PIN: &'static str = "123456";

    pub fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let identity = Arc::new(StaticIdentityClient::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(Metrics::new());
        let system_account = AccountId::new();
        let cipher = FieldCipher::new(vec![7u8; 32], b"fixture-hash-key".to_vec()).unwrap();

        let ctx = Arc::new(ServiceContext::new(
            repo.clone(),
            cipher,
            identity.clone(),
            publisher.clone(),
            Arc::new(SnowflakeGenerator::new(1)),
            system_account,
            metrics.clone(),
        ));

        Self {
            services: Services::new(ctx.clone()),
            repo,
            identity,
            publisher,
            metrics,
            ctx,
            system_account,
        }
    }

    /// Register a user with the identity directory and act as them.
    pub fn user(&self, user_id: &str, role: Role) -> RequestPrincipal {
        self.identity
            .insert(UserProfile::new(user_id, user_id, role));
        RequestPrincipal::new(role.id(), user_id, user_id)
    }

    pub fn admin(&self) -> RequestPrincipal {
        self.user("admin", Role::Admin)
    }

    async fn open_account(&self, principal: &RequestPrincipal) -> AccountResponse {
        let payload = AccountPayload {
            pin: Self::PIN.to_string(),
            ..Default::default()
        };
        self.services
            .accounts
            .create_account(principal, &payload)
            .await
            .unwrap()
    }

    /// A customer with a profile and an empty account.
    pub async fn customer(&self, user_id: &str, name: &str) -> (RequestPrincipal, AccountResponse) {
        let event = CustomerEvent {
            user_id: user_id.to_string(),
            legal_name: name.to_string(),
            phone: "0811".to_string(),
            email: format!("{}@mail.test", user_id),
            birthdate: "1995-05-05".to_string(),
            address: "Jl. Kenanga 3".to_string(),
            ..Default::default()
        };
        self.services.customers.create_from_event(&event).await.unwrap();

        let principal = self.user(user_id, Role::Customer);
        let account = self.open_account(&principal).await;
        (principal, account)
    }

    /// A merchant with a profile and an empty account.
    pub async fn merchant(&self, user_id: &str, name: &str) -> (RequestPrincipal, AccountResponse) {
        let event = MerchantEvent {
            user_id: user_id.to_string(),
            name: name.to_string(),
            phone: "021".to_string(),
            email: format!("{}@mail.test", user_id),
            address: "Jl. Braga 1".to_string(),
            pic_name: "Dewi".to_string(),
            pic_email: "dewi@mail.test".to_string(),
            pic_phone: "0822".to_string(),
            ..Default::default()
        };
        self.services.merchants.create_from_event(&event).await.unwrap();

        let principal = self.user(user_id, Role::Merchant);
        let account = self.open_account(&principal).await;
        (principal, account)
    }

    /// Credit a customer account with a system transaction.
    pub async fn fund(&self, account: &AccountResponse, nominal: i64) -> TransactionResponse {
        let payload = TransactionPayload {
            recipient_id: account.id.clone(),
            nominal: dec(nominal),
            description: "top up".to_string(),
            ..Default::default()
        };
        self.services
            .transactions
            .create_system(&self.admin(), &payload)
            .await
            .unwrap()
    }

    pub async fn balance(&self, account_id: &str) -> Decimal {
        let id = AccountId::parse(account_id).unwrap();
        self.repo
            .find_account(&AccountQuery::by_id(id))
            .await
            .unwrap()
            .unwrap()
            .balance
    }
}
