//! Contract tests for the reqwest transport and the data service against
//! wiremock servers. Unmatched requests get wiremock's default 404, which the
//! resolver treats as "try the next variant".

use std::sync::Arc;

use payroll_recon_core::{
    ApiClient, ApiResponse, CancelToken, ClientConfig, EmployeeRef, LateEntry, PayrollDataService,
    PayrollSource, ReconError, RequestDescriptor, StaticToken, Transport,
};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::with_token_provider(
        ClientConfig::new(server.uri()),
        StaticToken("test-token".to_string()),
    )
    .expect("client build")
}

fn service(server: &MockServer) -> PayrollDataService {
    PayrollDataService::new(Arc::new(client(server)))
}

// ── Payroll resolution ───────────────────────────────────────────────────

#[tokio::test]
async fn payroll_falls_through_to_api_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/employee_files/payroll"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not Found"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/employee_files/payroll"))
        .and(query_param("employee_id", "12"))
        .and(query_param("month", "2024-03"))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "month": "2024-03",
            "totals": {"hours": 160},
            "food_allowance": 30000,
            "days": {"2024-03-02": 8, "2024-03-01": 7.5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = service(&server)
        .fetch_payroll_month(&EmployeeRef::new(12), "2024-03", &CancelToken::new())
        .await
        .expect("payroll");

    assert_eq!(
        fetch.source,
        PayrollSource::Endpoint {
            path: "/api/employee_files/payroll".to_string()
        }
    );
    assert_eq!(fetch.payroll.hours_total, dec!(160));
    assert_eq!(fetch.payroll.food_allowance, dec!(30000));
    assert_eq!(fetch.payroll.rows.len(), 31);
    assert_eq!(fetch.payroll.rows[0].hours, dec!(7.5));
}

#[tokio::test]
async fn payroll_server_error_stops_resolution() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/employee_files/payroll"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "payroll engine down"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/employee_files/payroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"month": "2024-03"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = service(&server)
        .fetch_payroll_month(&EmployeeRef::new(12), "2024-03", &CancelToken::new())
        .await
        .expect_err("hard failure");

    match err {
        ReconError::Api {
            status,
            message,
            body,
        } => {
            assert_eq!(status, 500);
            assert_eq!(message, "payroll engine down");
            assert_eq!(body, json!({"detail": "payroll engine down"}));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

// ── Response decoding ────────────────────────────────────────────────────

#[tokio::test]
async fn no_content_and_empty_json_decode_as_empty() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/payroll/late_override/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "application/json"))
        .mount(&server)
        .await;

    let client = client(&server);
    let response = client
        .send(&RequestDescriptor::delete("/payroll/late_override/5"))
        .await
        .expect("delete");
    assert_eq!(response, ApiResponse::Empty);

    let response = client
        .send(&RequestDescriptor::get("/empty"))
        .await
        .expect("empty");
    assert_eq!(response, ApiResponse::Empty);
}

#[tokio::test]
async fn non_json_success_is_returned_as_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("export queued"))
        .mount(&server)
        .await;

    let response = client(&server)
        .send(&RequestDescriptor::get("/logs"))
        .await
        .expect("text");
    assert_eq!(response, ApiResponse::Text("export queued".to_string()));
}

#[tokio::test]
async fn error_message_prefers_detail_then_raw_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/detail"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"detail": "month is required", "message": "ignored"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already exists"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .send(&RequestDescriptor::get("/detail"))
        .await
        .expect_err("422");
    assert!(!err.is_soft());
    assert!(matches!(err, ReconError::Api { ref message, .. } if message == "month is required"));

    let err = client
        .send(&RequestDescriptor::get("/text"))
        .await
        .expect_err("409");
    assert_eq!(err.status(), Some(409));
    assert!(matches!(err, ReconError::Api { ref message, .. } if message == "already exists"));
}

#[tokio::test]
async fn empty_query_values_are_not_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/payroll/deductions"))
        .and(query_param("employee_id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let request = RequestDescriptor::get("/payroll/deductions")
        .param("employee_id", Some(4))
        .param("month", Some(""))
        .param::<_, String>("sort", None);
    client(&server).send(&request).await.expect("list");

    let received = server.received_requests().await.expect("recording enabled");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.query(), Some("employee_id=4"));
}

// ── Late override writes ─────────────────────────────────────────────────

#[tokio::test]
async fn late_override_create_then_reset() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/payroll/late_override"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "employee_id": 9,
            "date": "2024-03-04",
            "mode": "set",
            "amount_iqd": 3000,
            "note": "late bus"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 41})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/payroll/late_override/41"))
        .and(query_param("reason", "schedule confirmed"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server);
    let cancel = CancelToken::new();
    let entry = LateEntry::automatic(9, "2024-03-04", dec!(5000));

    let overridden = service
        .save_late_override(&entry, dec!(3000), "late bus", &cancel)
        .await
        .expect("create");
    assert_eq!(overridden.final_penalty(), dec!(3000));

    let restored = service
        .save_late_override(&overridden, dec!(5000), "schedule confirmed", &cancel)
        .await
        .expect("delete");
    assert!(!restored.is_overridden());
    assert_eq!(restored.final_penalty(), dec!(5000));
}
