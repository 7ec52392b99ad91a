//! API endpoint implementations.
//!
//! Each repository holds a [`Dispatch`](crate::request::Dispatch) implementor
//! and knows only its endpoint, verb and envelope key.

mod calls;
mod contacts;
mod events;
mod leads;
mod users;

pub use calls::CallsApi;
pub use contacts::ContactsApi;
pub use events::EventsApi;
pub use leads::LeadsApi;
pub use users::UsersApi;

/// Query parameters for list operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Page number, starting at 1.
    pub page: Option<u32>,
    /// Page size; the service caps it at 250.
    pub limit: Option<u32>,
    /// Free-text search across the entity's fields.
    pub query: Option<String>,
    /// Related data to include, e.g. `contacts`.
    pub with: Vec<String>,
    /// `filter[<key>]=<value>` pairs.
    pub filter: Vec<(String, String)>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Search by phone, email, name or any other field.
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.with.push(relation.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.push((key.into(), value.into()));
        self
    }

    /// Query string pairs in a stable order.
    pub(crate) fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(query) = &self.query {
            pairs.push(("query".to_string(), query.clone()));
        }
        if !self.with.is_empty() {
            pairs.push(("with".to_string(), self.with.join(",")));
        }
        for (key, value) in &self.filter {
            pairs.push((format!("filter[{key}]"), value.clone()));
        }
        pairs
    }
}
