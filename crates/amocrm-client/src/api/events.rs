//! Inbound-call events API (v2).

use crate::client::AmoCrmClient;
use crate::error::Result;
use crate::request::{ApiRequest, Dispatch, Endpoint};
use crate::types::{Event, EventAdd, EventItem};

const EVENTS: &str = "events";
const ITEMS: &str = "items";

/// Events API client.
pub struct EventsApi<D = AmoCrmClient> {
    client: D,
}

impl<D: Dispatch> EventsApi<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// Push incoming-call notifications to users' screens.
    pub async fn add(&self, events: &[Event]) -> Result<Vec<EventItem>> {
        let request = ApiRequest::post(Endpoint::v2(EVENTS)).json(&EventAdd { add: events })?;
        Ok(self.client.dispatch(request).await?.embedded(ITEMS)?)
    }
}
