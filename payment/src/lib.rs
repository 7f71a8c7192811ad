//! sp-payment Service
//!
//! Application layer of the payment service: request DTOs, the role-scoped services over
//! the ledger, the identity client and the profile event bus.

pub mod config;
pub mod dto;
pub mod events;
pub mod identity;
pub mod metrics;
pub mod services;

pub use config::PaymentConfig;
pub use events::{EventPublisher, EventSubscriber, PgEventPublisher, ProfileEventHandler};
pub use identity::{HttpIdentityClient, IdentityClient};
pub use metrics::Metrics;
pub use services::{ServiceContext, Services};
