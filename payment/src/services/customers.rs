//! Customer profile service.
//!
//! Profiles are created and tombstoned by events from the identity service; the request
//! side reads, corrects and deletes them.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use sp_payment_common::{time, CustomerId, PaymentError, RequestPrincipal, Result, Role};
use sp_payment_ledger::{Customer, ProfileFilter, ProfileKey};

use crate::dto::{CustomerPayload, CustomerResponse, ListCustomerResponse, ProfilesQuery};
use crate::events::CustomerEvent;

use super::ServiceContext;

const ENTITY: &str = "customers";

/// Plaintext profile fields, in stamp order.
struct CustomerFields<'a> {
    legal_name: &'a str,
    phone: &'a str,
    email: &'a str,
    birthdate: &'a str,
    address: &'a str,
}

impl<'a> From<&'a CustomerPayload> for CustomerFields<'a> {
    fn from(p: &'a CustomerPayload) -> Self {
        Self {
            legal_name: &p.legal_name,
            phone: &p.phone,
            email: &p.email,
            birthdate: &p.birthdate,
            address: &p.address,
        }
    }
}

impl<'a> From<&'a CustomerEvent> for CustomerFields<'a> {
    fn from(e: &'a CustomerEvent) -> Self {
        Self {
            legal_name: &e.legal_name,
            phone: &e.phone,
            email: &e.email,
            birthdate: &e.birthdate,
            address: &e.address,
        }
    }
}

/// Customer profiles.
pub struct CustomerService {
    ctx: Arc<ServiceContext>,
}

impl CustomerService {
    /// Create a new customer service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Encrypt the sensitive fields into `customer` and restamp the row.
    fn seal(&self, customer: &mut Customer, fields: CustomerFields<'_>) -> Result<()> {
        let mut sealer = self.ctx.cipher.sealer();
        customer.legal_name = sealer.seal(fields.legal_name.as_bytes())?;
        customer.phone = sealer.seal(fields.phone.as_bytes())?;
        customer.email = sealer.seal(fields.email.as_bytes())?;
        customer.birthdate = sealer.seal(fields.birthdate.as_bytes())?;
        customer.address = sealer.seal(fields.address.as_bytes())?;
        customer.row_hash = Some(sealer.finish()?);
        Ok(())
    }

    fn open_customer(&self, customer: &Customer) -> Result<CustomerResponse> {
        self.ctx.verify_row(
            ENTITY,
            &customer.id,
            &customer.sealed_fields(),
            customer.row_hash.as_deref(),
        )?;

        Ok(CustomerResponse {
            id: customer.id.to_string(),
            user_id: customer.user_id.clone(),
            legal_name: self.ctx.open(ENTITY, &customer.legal_name)?,
            phone: self.ctx.open(ENTITY, &customer.phone)?,
            email: self.ctx.open(ENTITY, &customer.email)?,
            birthdate: self.ctx.open(ENTITY, &customer.birthdate)?,
            address: self.ctx.open(ENTITY, &customer.address)?,
            photo_profile: customer.photo_profile.clone(),
        })
    }

    fn open_listed_customer(&self, customer: &Customer) -> CustomerResponse {
        self.ctx.check_listed_row(
            ENTITY,
            &customer.id,
            &customer.sealed_fields(),
            customer.row_hash.as_deref(),
        );

        CustomerResponse {
            id: customer.id.to_string(),
            user_id: customer.user_id.clone(),
            legal_name: self.ctx.open_listed(ENTITY, &customer.legal_name),
            phone: self.ctx.open_listed(ENTITY, &customer.phone),
            email: self.ctx.open_listed(ENTITY, &customer.email),
            birthdate: self.ctx.open_listed(ENTITY, &customer.birthdate),
            address: self.ctx.open_listed(ENTITY, &customer.address),
            photo_profile: customer.photo_profile.clone(),
        }
    }

    async fn find(&self, key: &ProfileKey<CustomerId>) -> Result<Customer> {
        self.ctx
            .repo
            .find_customer(key)
            .await?
            .ok_or(PaymentError::NotFound)
    }

    /// List customer profiles.
    #[instrument(skip(self, principal, query), fields(user_id = %principal.user_id))]
    pub async fn list_customers(
        &self,
        principal: &RequestPrincipal,
        query: &ProfilesQuery,
    ) -> Result<ListCustomerResponse> {
        principal.ensure(&[Role::Admin])?;

        let filter = ProfileFilter {
            keyword: query.keyword().map(str::to_string),
        };
        let page = query.page.pagination();
        let rows = self.ctx.repo.find_customers(&filter, page).await?;
        let total = self.ctx.repo.count_customers(&filter).await?;

        Ok(ListCustomerResponse {
            customers: rows.iter().map(|c| self.open_listed_customer(c)).collect(),
            meta: page.meta(total),
        })
    }

    /// One customer profile.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_customer(
        &self,
        principal: &RequestPrincipal,
        id: CustomerId,
    ) -> Result<CustomerResponse> {
        principal.ensure(&[Role::Admin])?;
        let customer = self.find(&ProfileKey::Id(id)).await?;
        self.open_customer(&customer)
    }

    /// The caller's own profile.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_customer_me(&self, principal: &RequestPrincipal) -> Result<CustomerResponse> {
        principal.ensure(&[Role::Admin, Role::Customer])?;
        let customer = self
            .find(&ProfileKey::User(principal.user_id.clone()))
            .await?;
        self.open_customer(&customer)
    }

    /// Replace the profile fields. An empty photo keeps the stored one.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn update_customer(
        &self,
        principal: &RequestPrincipal,
        id: CustomerId,
        payload: &CustomerPayload,
    ) -> Result<CustomerResponse> {
        principal.ensure(&[Role::Admin])?;
        payload.validate()?;

        let mut customer = self.find(&ProfileKey::Id(id)).await?;
        self.seal(&mut customer, payload.into())?;
        if !payload.photo_profile.trim().is_empty() {
            customer.photo_profile = payload.photo_profile.clone();
        }
        self.ctx.repo.update_customer(&customer).await?;

        info!(customer_id = %id, "Customer updated");
        self.open_customer(&customer)
    }

    /// Tombstone a profile.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn delete_customer(
        &self,
        principal: &RequestPrincipal,
        id: CustomerId,
    ) -> Result<()> {
        principal.ensure(&[Role::Admin])?;
        self.ctx.repo.delete_customer(&ProfileKey::Id(id)).await?;

        info!(customer_id = %id, "Customer deleted");
        Ok(())
    }

    /// Store the profile announced by `create-customer`. A user that already has a live
    /// profile keeps it.
    #[instrument(skip(self, event), fields(user_id = %event.user_id))]
    pub async fn create_from_event(&self, event: &CustomerEvent) -> Result<()> {
        if event.user_id.trim().is_empty() {
            return Err(PaymentError::MissingRequiredAttribute("user_id"));
        }

        let key = ProfileKey::User(event.user_id.clone());
        if self.ctx.repo.find_customer(&key).await?.is_some() {
            debug!("Customer already exists");
            return Ok(());
        }

        let mut customer = Customer {
            id: CustomerId::parse(&event.id).unwrap_or_else(|_| CustomerId::new()),
            user_id: event.user_id.clone(),
            legal_name: Vec::new(),
            phone: Vec::new(),
            email: Vec::new(),
            birthdate: Vec::new(),
            address: Vec::new(),
            photo_profile: event.photo_profile.clone(),
            row_hash: None,
            created_at: time::now(),
        };
        self.seal(&mut customer, event.into())?;
        self.ctx.repo.create_customer(&customer).await?;

        info!(customer_id = %customer.id, "Customer created");
        Ok(())
    }

    /// Tombstone the profile announced by `delete-customer`.
    #[instrument(skip(self))]
    pub async fn delete_by_user(&self, user_id: &str) -> Result<()> {
        self.ctx
            .repo
            .delete_customer(&ProfileKey::User(user_id.to_string()))
            .await?;

        info!("Customer deleted by event");
        Ok(())
    }
}
