//! Entity repositories end to end against a mock account.

mod common;

use amocrm_client::{
    Call, CallDirection, Contact, Event, FieldValues, Lead, LeadEmbedded, ListQuery,
};
use common::{TestCrm, fresh_token};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_leads_list_decodes_envelope() {
    let crm = TestCrm::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/leads"))
        .and(query_param("with", "contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"_embedded":{"leads":[{"id":42,"name":"X"}]}}"#,
        ))
        .expect(1)
        .mount(&crm.server)
        .await;

    let client = crm.client(fresh_token());
    let leads = client
        .leads()
        .list(&ListQuery::new().with("contacts"))
        .await
        .unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id, Some(42));
    assert_eq!(leads[0].name.as_deref(), Some("X"));
}

#[tokio::test]
async fn test_leads_create_with_tags() {
    let crm = TestCrm::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/leads"))
        .and(body_json(json!([{
            "name": "Deal",
            "_embedded": {"tags": [{"name": "partner_reg"}]}
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_links": {"self": {"href": "https://acme.amocrm.ru/api/v4/leads"}},
            "_embedded": {"leads": [{"id": 100, "request_id": "0"}]}
        })))
        .expect(1)
        .mount(&crm.server)
        .await;

    let lead = Lead {
        embedded: Some(LeadEmbedded {
            tags: vec![FieldValues::tag("partner_reg")],
            ..Default::default()
        }),
        ..Lead::named("Deal")
    };
    let client = crm.client(fresh_token());
    let created = client.leads().create(&[lead]).await.unwrap();

    assert_eq!(created[0].id, Some(100));
}

#[tokio::test]
async fn test_contacts_search_without_match_is_empty() {
    let crm = TestCrm::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/contacts"))
        .and(query_param("query", "+70000000000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&crm.server)
        .await;

    let client = crm.client(fresh_token());
    let contacts = client.contacts().search("+70000000000").await.unwrap();
    assert!(contacts.is_empty());
}

#[tokio::test]
async fn test_contacts_create_with_custom_fields() {
    let crm = TestCrm::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/contacts"))
        .and(body_json(json!([{
            "name": "Ann",
            "custom_fields_values": [
                {"field_code": "PHONE", "values": [{"value": "+79185436238"}]}
            ]
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"contacts": [{"id": 3}]}
        })))
        .expect(1)
        .mount(&crm.server)
        .await;

    let contact = Contact {
        name: Some("Ann".into()),
        custom_fields_values: Some(vec![FieldValues::custom_field(
            "PHONE",
            ["+79185436238"],
        )]),
        ..Default::default()
    };
    let client = crm.client(fresh_token());
    let created = client.contacts().create(&[contact]).await.unwrap();
    assert_eq!(created[0].id, Some(3));
}

#[tokio::test]
async fn test_calls_create() {
    let crm = TestCrm::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"calls": [{"id": 1, "entity_id": 3, "entity_type": "contact"}]}
        })))
        .expect(1)
        .mount(&crm.server)
        .await;

    let client = crm.client(fresh_token());
    let records = client
        .calls()
        .create(&[Call::new(CallDirection::Inbound, "+79185436238", "pbx", 12)])
        .await
        .unwrap();
    assert_eq!(records[0].entity_type.as_deref(), Some("contact"));
}

#[tokio::test]
async fn test_events_use_v2_endpoint() {
    let crm = TestCrm::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/events"))
        .and(body_json(json!({
            "add": [{"type": "phone_call", "phone_number": "+79185436238", "users": [7]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"items": [{"element_id": 3, "element_type": 1, "uid": "u1", "phone_number": "+79185436238"}]}
        })))
        .expect(1)
        .mount(&crm.server)
        .await;

    let client = crm.client(fresh_token());
    let items = client
        .events()
        .add(&[Event::phone_call("+79185436238", vec![7])])
        .await
        .unwrap();
    assert_eq!(items[0].element_id, 3);
}

#[tokio::test]
async fn test_user_not_found() {
    let crm = TestCrm::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/users/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&crm.server)
        .await;

    let client = crm.client(fresh_token());
    let err = client.users().get(999).await.unwrap_err();
    assert!(err.is_not_found());
}
