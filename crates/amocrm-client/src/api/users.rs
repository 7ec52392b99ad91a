//! Users API.

use crate::api::ListQuery;
use crate::client::AmoCrmClient;
use crate::error::Result;
use crate::request::{ApiRequest, Dispatch, Endpoint};
use crate::types::User;

const USERS: &str = "users";

/// Users API client.
pub struct UsersApi<D = AmoCrmClient> {
    client: D,
}

impl<D: Dispatch> UsersApi<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// Get a user by ID.
    pub async fn get(&self, id: u64) -> Result<User> {
        let request = ApiRequest::get(Endpoint::new(USERS).join(id));
        Ok(self.client.dispatch(request).await?.entity()?)
    }

    /// List account users.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<User>> {
        let request = ApiRequest::get(USERS).query(query.pairs());
        Ok(self.client.dispatch(request).await?.embedded(USERS)?)
    }
}
