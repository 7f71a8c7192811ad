//! Event bus: topics, publishing, and the subscriber that keeps profiles in step with the
//! identity service.
//!
//! The transport is PostgreSQL `LISTEN/NOTIFY`. Each topic is a notification channel and
//! each payload a JSON document.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

use sp_payment_common::{PaymentError, Result};

use crate::metrics::Metrics;
use crate::services::{CustomerService, MerchantService};

/// Topics this service publishes or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Ask the identity service to drop a user whose profile could not be created.
    DeleteUser,
    CreateCustomer,
    DeleteCustomer,
    CreateMerchant,
    DeleteMerchant,
    /// Reserved; accepted and ignored.
    CreateTransaction,
}

impl EventTopic {
    /// Topics the subscriber listens on.
    pub const SUBSCRIBED: [EventTopic; 5] = [
        EventTopic::CreateCustomer,
        EventTopic::DeleteCustomer,
        EventTopic::CreateMerchant,
        EventTopic::DeleteMerchant,
        EventTopic::CreateTransaction,
    ];

    /// Channel name on the bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTopic::DeleteUser => "delete-user",
            EventTopic::CreateCustomer => "create-customer",
            EventTopic::DeleteCustomer => "delete-customer",
            EventTopic::CreateMerchant => "create-merchant",
            EventTopic::DeleteMerchant => "delete-merchant",
            EventTopic::CreateTransaction => "create-trx",
        }
    }

    /// Decode a channel name.
    pub fn parse(channel: &str) -> Option<Self> {
        match channel {
            "delete-user" => Some(EventTopic::DeleteUser),
            "create-customer" => Some(EventTopic::CreateCustomer),
            "delete-customer" => Some(EventTopic::DeleteCustomer),
            "create-merchant" => Some(EventTopic::CreateMerchant),
            "delete-merchant" => Some(EventTopic::DeleteMerchant),
            "create-trx" => Some(EventTopic::CreateTransaction),
            _ => None,
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `delete-user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub user_id: String,
}

/// Payload of the customer topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerEvent {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
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

/// Payload of the merchant topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantEvent {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub pic_name: String,
    #[serde(default)]
    pub pic_email: String,
    #[serde(default)]
    pub pic_phone: String,
    #[serde(default)]
    pub photo_profile: String,
}

/// Publishes JSON documents to a topic.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: EventTopic, payload: &Value) -> Result<()>;
}

/// [`EventPublisher`] over `pg_notify`.
pub struct PgEventPublisher {
    pool: PgPool,
}

impl PgEventPublisher {
    /// Create a new publisher.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EventPublisher for PgEventPublisher {
    #[instrument(skip(self, payload))]
    async fn publish(&self, topic: EventTopic, payload: &Value) -> Result<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(topic.as_str())
            .bind(payload.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(topic = %topic, error = %e, "Failed to publish event");
                PaymentError::Transport(e.to_string())
            })?;

        debug!(topic = %topic, "Event published");
        Ok(())
    }
}

/// [`EventPublisher`] that keeps everything it is given.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(EventTopic, Value)>>,
}

impl RecordingPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<(EventTopic, Value)> {
        self.published.lock().clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: EventTopic, payload: &Value) -> Result<()> {
        self.published.lock().push((topic, payload.clone()));
        Ok(())
    }
}

/// Reacts to one event.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, topic: EventTopic, payload: &str) -> Result<()>;
}

fn parse_payload<T: serde::de::DeserializeOwned>(topic: EventTopic, payload: &str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| PaymentError::bad_request(format!("malformed {} payload: {}", topic, e)))
}

/// Creates and tombstones customer and merchant profiles.
pub struct ProfileEventHandler {
    customers: Arc<CustomerService>,
    merchants: Arc<MerchantService>,
    publisher: Arc<dyn EventPublisher>,
}

impl ProfileEventHandler {
    /// Create a new handler.
    pub fn new(
        customers: Arc<CustomerService>,
        merchants: Arc<MerchantService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            customers,
            merchants,
            publisher,
        }
    }

    /// Undo the identity-side user of a profile that could not be stored.
    async fn compensate(&self, user_id: &str) {
        let payload = match serde_json::to_value(UserEvent {
            user_id: user_id.to_string(),
        }) {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to encode delete-user");
                return;
            }
        };

        if let Err(e) = self.publisher.publish(EventTopic::DeleteUser, &payload).await {
            error!(user_id = %user_id, error = %e, "Failed to request user deletion");
        } else {
            warn!(user_id = %user_id, "Requested user deletion after failed profile creation");
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for ProfileEventHandler {
    async fn handle(&self, topic: EventTopic, payload: &str) -> Result<()> {
        match topic {
            EventTopic::CreateCustomer => {
                let event: CustomerEvent = parse_payload(topic, payload)?;
                if let Err(e) = self.customers.create_from_event(&event).await {
                    self.compensate(&event.user_id).await;
                    return Err(e);
                }
            }
            EventTopic::DeleteCustomer => {
                let event: CustomerEvent = parse_payload(topic, payload)?;
                self.customers.delete_by_user(&event.user_id).await?;
            }
            EventTopic::CreateMerchant => {
                let event: MerchantEvent = parse_payload(topic, payload)?;
                if let Err(e) = self.merchants.create_from_event(&event).await {
                    self.compensate(&event.user_id).await;
                    return Err(e);
                }
            }
            EventTopic::DeleteMerchant => {
                let event: MerchantEvent = parse_payload(topic, payload)?;
                self.merchants.delete_by_user(&event.user_id).await?;
            }
            EventTopic::CreateTransaction | EventTopic::DeleteUser => {
                debug!(topic = %topic, "Event ignored");
            }
        }
        Ok(())
    }
}

/// Receives notifications and dispatches them to a handler.
pub struct EventSubscriber {
    handler: Arc<dyn EventHandler>,
    metrics: Arc<Metrics>,
}

impl EventSubscriber {
    /// Create a new subscriber.
    pub fn new(handler: Arc<dyn EventHandler>, metrics: Arc<Metrics>) -> Self {
        Self { handler, metrics }
    }

    /// Open a listener on every subscribed topic.
    pub async fn listen(pool: &PgPool) -> Result<PgListener> {
        let mut listener = PgListener::connect_with(pool)
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        let channels: Vec<&str> = EventTopic::SUBSCRIBED.iter().map(|t| t.as_str()).collect();
        listener
            .listen_all(channels)
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        info!(topics = ?EventTopic::SUBSCRIBED, "Subscribed to events");
        Ok(listener)
    }

    /// Dispatch notifications until the task is cancelled. A failed receive is retried
    /// after a short pause; the listener reconnects on its own.
    pub async fn run(&self, mut listener: PgListener) {
        loop {
            match listener.recv().await {
                Ok(notification) => {
                    self.dispatch(notification.channel(), notification.payload())
                        .await;
                }
                Err(e) => {
                    error!(error = %e, "Event listener failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Handle one notification. Failures are logged and counted, never propagated.
    pub async fn dispatch(&self, channel: &str, payload: &str) {
        let Some(topic) = EventTopic::parse(channel) else {
            warn!(channel = %channel, "Event on unknown channel");
            self.metrics.event_failed();
            return;
        };

        match self.handler.handle(topic, payload).await {
            Ok(()) => {
                debug!(topic = %topic, "Event handled");
                self.metrics.event_handled();
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Event handling failed");
                self.metrics.event_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Fixture;
    use serde_json::json;
    use sp_payment_common::Role;

    fn subscriber(fx: &Fixture) -> EventSubscriber {
        let handler = ProfileEventHandler::new(
            fx.services.customers.clone(),
            fx.services.merchants.clone(),
            fx.publisher.clone(),
        );
        EventSubscriber::new(Arc::new(handler), fx.metrics.clone())
    }

    #[test]
    fn test_topic_names() {
        for topic in EventTopic::SUBSCRIBED {
            assert_eq!(EventTopic::parse(topic.as_str()), Some(topic));
        }
        assert_eq!(EventTopic::parse("delete-user"), Some(EventTopic::DeleteUser));
        assert_eq!(EventTopic::parse("request-secure-route"), None);
    }

    #[tokio::test]
    async fn test_customer_lifecycle() {
        let fx = Fixture::new();
        let sub = subscriber(&fx);
        let created = json!({
            "id": "",
            "user_id": "c-1",
            "legal_name": "Siti",
            "phone": "0812",
            "email": "siti@mail.test",
            "birth_date": "1990-02-03",
            "address": "Jl. Melati 7",
        })
        .to_string();

        sub.dispatch("create-customer", &created).await;
        sub.dispatch("create-customer", &created).await;

        let me = fx
            .services
            .customers
            .get_customer_me(&fx.user("c-1", Role::Customer))
            .await
            .unwrap();
        assert_eq!(me.legal_name, "Siti");
        assert_eq!(me.birthdate, "1990-02-03");

        sub.dispatch("delete-customer", r#"{"user_id": "c-1"}"#).await;
        assert_eq!(
            fx.services
                .customers
                .get_customer_me(&fx.user("c-1", Role::Customer))
                .await,
            Err(PaymentError::NotFound)
        );

        let snapshot = fx.metrics.snapshot();
        assert_eq!(snapshot.events_handled, 3);
        assert_eq!(snapshot.events_failed, 0);
        assert!(fx.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_bad_events_are_counted_and_skipped() {
        let fx = Fixture::new();
        let sub = subscriber(&fx);

        sub.dispatch("create-merchant", "not json").await;
        sub.dispatch("request-secure-route", "{}").await;
        sub.dispatch("delete-merchant", r#"{"user_id": "m-404"}"#).await;
        sub.dispatch("create-trx", "{}").await;

        let snapshot = fx.metrics.snapshot();
        assert_eq!(snapshot.events_failed, 3);
        assert_eq!(snapshot.events_handled, 1);
        assert!(fx.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_profile_asks_for_user_deletion() {
        let fx = Fixture::new();
        let sub = subscriber(&fx);

        sub.dispatch("create-merchant", r#"{"user_id": " ", "name": "Kopi Kita"}"#)
            .await;

        assert_eq!(
            fx.publisher.published(),
            vec![(EventTopic::DeleteUser, json!({"user_id": " "}))]
        );
        assert_eq!(fx.metrics.snapshot().events_failed, 1);
    }
}
