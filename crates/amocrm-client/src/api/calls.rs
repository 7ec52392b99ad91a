//! Calls API.

use crate::client::AmoCrmClient;
use crate::error::Result;
use crate::request::{ApiRequest, Dispatch};
use crate::types::{Call, CallRecord};

const CALLS: &str = "calls";

/// Calls API client.
pub struct CallsApi<D = AmoCrmClient> {
    client: D,
}

impl<D: Dispatch> CallsApi<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// Log calls against the contacts owning their phone numbers.
    pub async fn create(&self, calls: &[Call]) -> Result<Vec<CallRecord>> {
        let request = ApiRequest::post(CALLS).json(calls)?;
        Ok(self.client.dispatch(request).await?.embedded(CALLS)?)
    }
}
