//! Leads API.

use crate::api::ListQuery;
use crate::client::AmoCrmClient;
use crate::error::Result;
use crate::request::{ApiRequest, Dispatch, Endpoint};
use crate::types::Lead;

const LEADS: &str = "leads";

/// Leads API client.
pub struct LeadsApi<D = AmoCrmClient> {
    client: D,
}

impl<D: Dispatch> LeadsApi<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// Get a lead by ID.
    pub async fn get(&self, id: u64) -> Result<Lead> {
        let request = ApiRequest::get(Endpoint::new(LEADS).join(id));
        Ok(self.client.dispatch(request).await?.entity()?)
    }

    /// List leads. No match yields an empty list.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Lead>> {
        let request = ApiRequest::get(LEADS).query(query.pairs());
        Ok(self.client.dispatch(request).await?.embedded_or_empty(LEADS)?)
    }

    /// Create leads; returns them with their assigned IDs.
    pub async fn create(&self, leads: &[Lead]) -> Result<Vec<Lead>> {
        let request = ApiRequest::post(LEADS).json(leads)?;
        Ok(self.client.dispatch(request).await?.embedded(LEADS)?)
    }

    /// Update leads by ID. Unset fields are left unchanged.
    pub async fn update(&self, leads: &[Lead]) -> Result<Vec<Lead>> {
        let request = ApiRequest::patch(LEADS).json(leads)?;
        Ok(self.client.dispatch(request).await?.embedded(LEADS)?)
    }
}
