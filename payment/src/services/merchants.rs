//! Merchant profile service.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use sp_payment_common::{time, MerchantId, PaymentError, RequestPrincipal, Result, Role};
use sp_payment_ledger::{Merchant, ProfileFilter, ProfileKey};

use crate::dto::{ListMerchantResponse, MerchantPayload, MerchantResponse, ProfilesQuery};
use crate::events::MerchantEvent;

use super::ServiceContext;

const ENTITY: &str = "merchants";

/// Merchant profiles. Business fields are plaintext; the PIC contact is encrypted.
pub struct MerchantService {
    ctx: Arc<ServiceContext>,
}

impl MerchantService {
    /// Create a new merchant service.
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    fn seal(&self, merchant: &mut Merchant, pic: [&str; 3]) -> Result<()> {
        let mut sealer = self.ctx.cipher.sealer();
        merchant.pic_name = sealer.seal(pic[0].as_bytes())?;
        merchant.pic_email = sealer.seal(pic[1].as_bytes())?;
        merchant.pic_phone = sealer.seal(pic[2].as_bytes())?;
        merchant.row_hash = Some(sealer.finish()?);
        Ok(())
    }

    fn response(merchant: &Merchant, pic: [String; 3]) -> MerchantResponse {
        let [pic_name, pic_email, pic_phone] = pic;
        MerchantResponse {
            id: merchant.id.to_string(),
            user_id: merchant.user_id.clone(),
            name: merchant.name.clone(),
            phone: merchant.phone.clone(),
            email: merchant.email.clone(),
            address: merchant.address.clone(),
            pic_name,
            pic_email,
            pic_phone,
            photo_profile: merchant.photo_profile.clone(),
        }
    }

    fn open_merchant(&self, merchant: &Merchant) -> Result<MerchantResponse> {
        self.ctx.verify_row(
            ENTITY,
            &merchant.id,
            &merchant.sealed_fields(),
            merchant.row_hash.as_deref(),
        )?;

        let pic = [
            self.ctx.open(ENTITY, &merchant.pic_name)?,
            self.ctx.open(ENTITY, &merchant.pic_email)?,
            self.ctx.open(ENTITY, &merchant.pic_phone)?,
        ];
        Ok(Self::response(merchant, pic))
    }

    fn open_listed_merchant(&self, merchant: &Merchant) -> MerchantResponse {
        self.ctx.check_listed_row(
            ENTITY,
            &merchant.id,
            &merchant.sealed_fields(),
            merchant.row_hash.as_deref(),
        );

        let pic = merchant
            .sealed_fields()
            .map(|blob| self.ctx.open_listed(ENTITY, blob));
        Self::response(merchant, pic)
    }

    async fn find(&self, key: &ProfileKey<MerchantId>) -> Result<Merchant> {
        self.ctx
            .repo
            .find_merchant(key)
            .await?
            .ok_or(PaymentError::NotFound)
    }

    /// List merchant profiles, optionally by name keyword.
    #[instrument(skip(self, principal, query), fields(user_id = %principal.user_id))]
    pub async fn list_merchants(
        &self,
        principal: &RequestPrincipal,
        query: &ProfilesQuery,
    ) -> Result<ListMerchantResponse> {
        principal.ensure(&[Role::Admin])?;

        let filter = ProfileFilter {
            keyword: query.keyword().map(str::to_string),
        };
        let page = query.page.pagination();
        let rows = self.ctx.repo.find_merchants(&filter, page).await?;
        let total = self.ctx.repo.count_merchants(&filter).await?;

        Ok(ListMerchantResponse {
            merchants: rows.iter().map(|m| self.open_listed_merchant(m)).collect(),
            meta: page.meta(total),
        })
    }

    /// One merchant profile.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_merchant(
        &self,
        principal: &RequestPrincipal,
        id: MerchantId,
    ) -> Result<MerchantResponse> {
        principal.ensure(&[Role::Admin])?;
        let merchant = self.find(&ProfileKey::Id(id)).await?;
        self.open_merchant(&merchant)
    }

    /// The caller's own profile.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_merchant_me(&self, principal: &RequestPrincipal) -> Result<MerchantResponse> {
        principal.ensure(&[Role::Admin, Role::Merchant])?;
        let merchant = self
            .find(&ProfileKey::User(principal.user_id.clone()))
            .await?;
        self.open_merchant(&merchant)
    }

    /// Replace the profile fields. An empty photo keeps the stored one.
    #[instrument(skip(self, principal, payload), fields(user_id = %principal.user_id))]
    pub async fn update_merchant(
        &self,
        principal: &RequestPrincipal,
        id: MerchantId,
        payload: &MerchantPayload,
    ) -> Result<MerchantResponse> {
        principal.ensure(&[Role::Admin])?;
        payload.validate()?;

        let mut merchant = self.find(&ProfileKey::Id(id)).await?;
        merchant.name = payload.name.clone();
        merchant.phone = payload.phone.clone();
        merchant.email = payload.email.clone();
        merchant.address = payload.address.clone();
        if !payload.photo_profile.trim().is_empty() {
            merchant.photo_profile = payload.photo_profile.clone();
        }
        self.seal(
            &mut merchant,
            [
                payload.pic_name.as_str(),
                payload.pic_email.as_str(),
                payload.pic_phone.as_str(),
            ],
        )?;
        self.ctx.repo.update_merchant(&merchant).await?;

        info!(merchant_id = %id, "Merchant updated");
        self.open_merchant(&merchant)
    }

    /// Tombstone a profile.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn delete_merchant(
        &self,
        principal: &RequestPrincipal,
        id: MerchantId,
    ) -> Result<()> {
        principal.ensure(&[Role::Admin])?;
        self.ctx.repo.delete_merchant(&ProfileKey::Id(id)).await?;

        info!(merchant_id = %id, "Merchant deleted");
        Ok(())
    }

    /// Store the profile announced by `create-merchant`. A user that already has a live
    /// profile keeps it.
    #[instrument(skip(self, event), fields(user_id = %event.user_id))]
    pub async fn create_from_event(&self, event: &MerchantEvent) -> Result<()> {
        if event.user_id.trim().is_empty() {
            return Err(PaymentError::MissingRequiredAttribute("user_id"));
        }

        let key = ProfileKey::User(event.user_id.clone());
        if self.ctx.repo.find_merchant(&key).await?.is_some() {
            debug!("Merchant already exists");
            return Ok(());
        }

        let mut merchant = Merchant {
            id: MerchantId::parse(&event.id).unwrap_or_else(|_| MerchantId::new()),
            user_id: event.user_id.clone(),
            name: event.name.clone(),
            phone: event.phone.clone(),
            email: event.email.clone(),
            address: event.address.clone(),
            pic_name: Vec::new(),
            pic_email: Vec::new(),
            pic_phone: Vec::new(),
            photo_profile: event.photo_profile.clone(),
            row_hash: None,
            created_at: time::now(),
        };
        let pic = [
            event.pic_name.as_str(),
            event.pic_email.as_str(),
            event.pic_phone.as_str(),
        ];
        self.seal(&mut merchant, pic)?;
        self.ctx.repo.create_merchant(&merchant).await?;

        info!(merchant_id = %merchant.id, "Merchant created");
        Ok(())
    }

    /// Tombstone the profile announced by `delete-merchant`.
    #[instrument(skip(self))]
    pub async fn delete_by_user(&self, user_id: &str) -> Result<()> {
        self.ctx
            .repo
            .delete_merchant(&ProfileKey::User(user_id.to_string()))
            .await?;

        info!("Merchant deleted by event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Fixture;
    use sp_payment_ledger::MerchantRepository;

    #[tokio::test]
    async fn test_keyword_search_and_plain_fields() {
        let fx = Fixture::new();
        fx.merchant("m-1", "Kopi Kita").await;
        fx.merchant("m-2", "Roti Bakar").await;
        let admin = fx.admin();

        let all = fx
            .services
            .merchants
            .list_merchants(&admin, &ProfilesQuery::default())
            .await
            .unwrap();
        assert_eq!(all.meta.total_item, 2);

        let kopi = fx
            .services
            .merchants
            .list_merchants(
                &admin,
                &ProfilesQuery {
                    keyword: Some("kopi".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(kopi.merchants.len(), 1);
        assert_eq!(kopi.merchants[0].name, "Kopi Kita");

        let stored = fx
            .repo
            .find_merchant(&ProfileKey::User("m-1".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Kopi Kita");
        assert_ne!(stored.pic_name, kopi.merchants[0].pic_name.as_bytes().to_vec());

        let me = fx
            .services
            .merchants
            .get_merchant_me(&fx.user("m-1", Role::Merchant))
            .await
            .unwrap();
        assert_eq!(me, kopi.merchants[0]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let fx = Fixture::new();
        let (owner, _) = fx.merchant("m-1", "Kopi Kita").await;
        let admin = fx.admin();
        let id = fx.ctx.own_merchant(&owner).await.unwrap().id;

        let payload = MerchantPayload {
            name: "Kopi Kita Dua".to_string(),
            phone: "021".to_string(),
            email: "kopi@mail.test".to_string(),
            address: "Jl. Braga 5".to_string(),
            pic_name: "Budi".to_string(),
            pic_email: "budi@mail.test".to_string(),
            pic_phone: "0899".to_string(),
            photo_profile: String::new(),
        };
        let updated = fx
            .services
            .merchants
            .update_merchant(&admin, id, &payload)
            .await
            .unwrap();
        assert_eq!(updated.name, "Kopi Kita Dua");
        assert_eq!(updated.pic_name, "Budi");

        assert_eq!(
            fx.services.merchants.update_merchant(&owner, id, &payload).await,
            Err(PaymentError::NoAccess)
        );

        fx.services.merchants.delete_merchant(&admin, id).await.unwrap();
        assert_eq!(
            fx.services.merchants.get_merchant(&admin, id).await,
            Err(PaymentError::NotFound)
        );
        assert_eq!(
            fx.services.merchants.delete_by_user("m-1").await,
            Err(PaymentError::NotFound)
        );
    }
}
