use crate::domain::partner::{NewPartner, Partner, PartnerId};
use crate::domain::ports::LibraryStoreRef;
use crate::error::{LibraryError, Result};
use tracing::{info, instrument};

/// Maintains the partners allowed to borrow books.
pub struct PartnerService {
    store: LibraryStoreRef,
}

impl PartnerService {
    pub fn new(store: LibraryStoreRef) -> Self {
        Self { store }
    }

    #[instrument(skip_all, err)]
    pub async fn register(&self, partner: &NewPartner) -> Result<Partner> {
        partner.validate()?;
        let stored = self.store.insert_partner(partner).await?;
        info!(partner_id = %stored.id, "partner registered");
        Ok(stored)
    }

    #[instrument(skip_all, fields(partner_id = %partner.id), err)]
    pub async fn update(&self, partner: &Partner) -> Result<()> {
        partner.validate()?;
        if !self.store.update_partner(partner).await? {
            return Err(LibraryError::PartnerNotFound(partner.id));
        }
        Ok(())
    }

    /// Marks a partner as inactive; inactive partners cannot borrow.
    pub async fn deactivate(&self, id: PartnerId) -> Result<Partner> {
        let mut partner = self
            .find(id)
            .await?
            .ok_or(LibraryError::PartnerNotFound(id))?;
        partner.is_active = false;
        self.update(&partner).await?;
        Ok(partner)
    }

    pub async fn find(&self, id: PartnerId) -> Result<Option<Partner>> {
        self.store.find_partner(id).await
    }

    pub async fn list(&self) -> Result<Vec<Partner>> {
        self.store.list_partners().await
    }

    pub async fn is_active(&self, id: PartnerId) -> Result<bool> {
        self.store.is_partner_active(id).await
    }
}
