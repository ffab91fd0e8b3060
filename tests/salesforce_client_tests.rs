//! Salesforce REST client against a wiremock server.

use account_roundtrip::crm::{CrmClient, CrmError, SalesforceClient};
use account_roundtrip::models::AccountFields;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "/services/data/v60.0";

async fn authenticated_client(server: &MockServer) -> SalesforceClient {
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=test-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "sf-token",
            "instance_url": server.uri(),
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;

    let client = SalesforceClient::new(
        server.uri(),
        "test-client",
        "test-secret",
        "v60.0",
        Duration::from_secs(5),
    )
    .unwrap();
    client.authenticate().await.unwrap();
    client
}

#[tokio::test]
async fn test_auth_rejection_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_client"}"#))
        .mount(&server)
        .await;

    let client =
        SalesforceClient::new(server.uri(), "bad", "bad", "v60.0", Duration::from_secs(5)).unwrap();
    let err = client.authenticate().await.unwrap_err();

    assert!(matches!(err, CrmError::Auth { status: 400, .. }));
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_create_returns_assigned_id() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{API}/sobjects/Account/")))
        .and(header("authorization", "Bearer sf-token"))
        .and(body_json(json!({
            "Name": "AutoAcct-run-1",
            "BillingCountry": "US",
            "NumberOfEmployees": 250
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "001000000000001AAA",
            "success": true,
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fields = AccountFields {
        name: Some("AutoAcct-run-1".to_string()),
        billing_country: Some("US".to_string()),
        number_of_employees: Some(250),
        phone: None,
    };
    let id = client.create_account(&fields).await.unwrap();

    assert_eq!(id, "001000000000001AAA");
}

#[tokio::test]
async fn test_create_server_error_is_api_error() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{API}/sobjects/Account/")))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream timeout"))
        .mount(&server)
        .await;

    let err = client
        .create_account(&AccountFields::default())
        .await
        .unwrap_err();

    match err {
        CrmError::Api {
            operation, status, ..
        } => {
            assert_eq!(operation, "create");
            assert_eq!(status, 500);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_sends_phone_only() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("PATCH"))
        .and(path(format!("{API}/sobjects/Account/001A")))
        .and(body_json(json!({ "Phone": "+15551234567" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_account("001A", &AccountFields::phone_only("+15551234567"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_of_missing_record_fails() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("PATCH"))
        .and(path(format!("{API}/sobjects/Account/INVALID_ID")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!([
            { "errorCode": "NOT_FOUND", "message": "The requested resource does not exist" }
        ])))
        .mount(&server)
        .await;

    let err = client
        .update_account("INVALID_ID", &AccountFields::phone_only("+15551234567"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_treats_missing_record_as_success() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("DELETE"))
        .and(path(format!("{API}/sobjects/Account/001GONE")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{API}/sobjects/Account/001LIVE")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_account("001GONE").await.unwrap();
    client.delete_account("001LIVE").await.unwrap();
}

#[tokio::test]
async fn test_delete_server_error_propagates() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("DELETE"))
        .and(path(format!("{API}/sobjects/Account/001X")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.delete_account("001X").await.unwrap_err();
    assert!(matches!(err, CrmError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_query_by_name_prefix_escapes_quotes() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/query")))
        .and(query_param(
            "q",
            "SELECT Id, Name, BillingCountry, NumberOfEmployees, Phone FROM Account WHERE Name LIKE 'AutoAcct-o\\'x%'",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 1,
            "done": true,
            "records": [{
                "attributes": { "type": "Account" },
                "Id": "001A",
                "Name": "AutoAcct-o'x-1",
                "BillingCountry": "FR",
                "NumberOfEmployees": 42,
                "Phone": null
            }]
        })))
        .mount(&server)
        .await;

    let records = client.query_by_name_prefix("AutoAcct-o'x").await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "001A");
    assert_eq!(records[0].billing_country.as_deref(), Some("FR"));
    assert_eq!(records[0].number_of_employees, Some(42));
    assert_eq!(records[0].phone, None);
}
