//! Entity types for the amoCRM API.
//!
//! Every optional field is left out of request bodies when unset, so the
//! same struct serves for creation, partial update and decoding.

use serde::{Deserialize, Serialize};

use crate::fields::FieldValues;

// ─────────────────────────────────────────────────────────────────────────────
// Leads
// ─────────────────────────────────────────────────────────────────────────────

/// Nested entities of a lead. Only tags can be written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadEmbedded {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<FieldValues>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<FieldValues>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companies: Vec<FieldValues>,
}

/// A deal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    /// Defaults to the first stage of the main pipeline on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<u64>,
    /// `0` marks the lead as created by a robot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<u64>,
    /// Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    /// Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_reason_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields_values: Option<Vec<FieldValues>>,
    #[serde(rename = "_embedded", skip_serializing_if = "Option::is_none")]
    pub embedded: Option<LeadEmbedded>,
}

impl Lead {
    /// A lead with only a name, ready to create.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Contacts
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactEmbedded {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<FieldValues>,
}

/// A person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields_values: Option<Vec<FieldValues>>,
    #[serde(rename = "_embedded", skip_serializing_if = "Option::is_none")]
    pub embedded: Option<ContactEmbedded>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// An account user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Calls
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// A call to log against the contact owning `phone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub direction: CallDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniq: Option<String>,
    /// Seconds.
    pub duration: u32,
    pub source: String,
    /// Recording URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Used to find the contact; any format.
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_result: Option<String>,
    /// 1 left a message, 2 call back later, 3 not available, 4 talked,
    /// 5 wrong number, 6 no answer, 7 busy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_status: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Echoed back unchanged in the matching [`CallRecord`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Call {
    pub fn new(
        direction: CallDirection,
        phone: impl Into<String>,
        source: impl Into<String>,
        duration: u32,
    ) -> Self {
        Self {
            direction,
            uniq: None,
            duration,
            source: source.into(),
            link: None,
            phone: phone.into(),
            call_result: None,
            call_status: None,
            responsible_user_id: None,
            created_by: None,
            updated_by: None,
            created_at: None,
            updated_at: None,
            request_id: None,
        }
    }
}

/// A logged call as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(default)]
    pub id: Option<u64>,
    /// Entity the call was attached to.
    #[serde(default)]
    pub entity_id: Option<u64>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub account_id: Option<u64>,
    #[serde(default)]
    pub request_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Events (v2)
// ─────────────────────────────────────────────────────────────────────────────

/// An inbound-call notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Always `phone_call` for call notifications.
    #[serde(rename = "type")]
    pub kind: String,
    pub phone_number: String,
    /// Users to notify; everyone when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<u64>,
}

impl Event {
    pub fn phone_call(phone_number: impl Into<String>, users: Vec<u64>) -> Self {
        Self {
            kind: "phone_call".to_string(),
            phone_number: phone_number.into(),
            users,
        }
    }
}

/// Request body of the events endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct EventAdd<'a> {
    pub add: &'a [Event],
}

/// One accepted notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
    #[serde(default)]
    pub element_id: u64,
    #[serde(default)]
    pub element_type: u32,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub phone_number: String,
}
