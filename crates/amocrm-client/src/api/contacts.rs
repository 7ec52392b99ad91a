//! Contacts API.

use crate::api::ListQuery;
use crate::client::AmoCrmClient;
use crate::error::Result;
use crate::request::{ApiRequest, Dispatch, Endpoint};
use crate::types::Contact;

const CONTACTS: &str = "contacts";

/// Contacts API client.
pub struct ContactsApi<D = AmoCrmClient> {
    client: D,
}

impl<D: Dispatch> ContactsApi<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// List contacts. No match yields an empty list.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Contact>> {
        let request = ApiRequest::get(CONTACTS).query(query.pairs());
        Ok(self
            .client
            .dispatch(request)
            .await?
            .embedded_or_empty(CONTACTS)?)
    }

    /// Contacts matching a phone number, email or name.
    pub async fn search(&self, term: &str) -> Result<Vec<Contact>> {
        self.list(&ListQuery::new().search(term)).await
    }

    /// Get a contact by ID.
    pub async fn get(&self, id: u64) -> Result<Contact> {
        let request = ApiRequest::get(Endpoint::new(CONTACTS).join(id));
        Ok(self.client.dispatch(request).await?.entity()?)
    }

    /// Create contacts; returns them with their assigned IDs.
    pub async fn create(&self, contacts: &[Contact]) -> Result<Vec<Contact>> {
        let request = ApiRequest::post(CONTACTS).json(contacts)?;
        Ok(self.client.dispatch(request).await?.embedded(CONTACTS)?)
    }

    /// Update contacts by ID.
    pub async fn update(&self, contacts: &[Contact]) -> Result<Vec<Contact>> {
        let request = ApiRequest::patch(CONTACTS).json(contacts)?;
        Ok(self.client.dispatch(request).await?.embedded(CONTACTS)?)
    }
}
