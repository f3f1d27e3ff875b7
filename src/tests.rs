#[cfg(test)]
mod integration_tests {
    use crate::auth::TOKEN_HEADER;
    use crate::test_utils::test_utils::{
        setup_test_app, setup_test_app_with_client, webhook_token, StaticClient,
    };
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn token_header() -> HeaderName {
        HeaderName::from_static(TOKEN_HEADER)
    }

    fn token_value(user_id: &str) -> HeaderValue {
        HeaderValue::from_str(&webhook_token(user_id)).unwrap()
    }

    fn invoice(id: &str, memo: &str, date: &str) -> Value {
        json!({
            "id": id,
            "classification": "invoice",
            "memo": memo,
            "currency": "usd",
            "totalAmount": "120.50",
            "transactionDate": date,
            "lineItems": [
                {"description": "Consulting", "amount": 120.5, "type": "debit"}
            ]
        })
    }

    fn bulk(records: Vec<Value>, integration_id: &str) -> Value {
        json!({
            "records": records,
            "connectionId": format!("conn-{integration_id}"),
            "integrationId": integration_id,
            "integrationName": integration_id.to_uppercase(),
            "userId": "user-1"
        })
    }

    async fn server() -> TestServer {
        TestServer::new(setup_test_app().await).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = server().await;

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["imports_enabled"], false);
        assert_eq!(body["webhooks_enabled"], true);
    }

    #[tokio::test]
    async fn test_bulk_upsert_is_idempotent() {
        let server = server().await;
        let records = vec![
            invoice("inv-1", "first", "2025-01-01"),
            invoice("inv-2", "second", "2025-01-02"),
            invoice("inv-3", "third", "2025-01-03"),
        ];

        let response = server
            .post("/api/transactions")
            .json(&bulk(records.clone(), "quickbooks"))
            .await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["inserted"], 3);
        assert_eq!(body["modified"], 0);

        let mut changed = records;
        changed[1]["memo"] = json!("second, amended");
        let response = server
            .post("/api/transactions")
            .json(&bulk(changed, "quickbooks"))
            .await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["inserted"], 0);
        assert_eq!(body["modified"], 3);
        assert_eq!(body["total"], 3);

        let body: Value = server.get("/api/transactions").await.json();
        assert_eq!(body["total"], 3);
        let amended = body["records"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["externalId"] == "inv-2")
            .unwrap();
        assert_eq!(amended["memo"], "second, amended");
        assert_eq!(amended["currency"], "USD");
        assert_eq!(amended["classification"], "invoice");
        assert_eq!(amended["userId"], "user-1");
        assert_eq!(amended["lineItems"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_upsert_rejects_bad_payloads() {
        let server = server().await;

        let response = server
            .post("/api/transactions")
            .json(&bulk(vec![json!({"id": "x", "classification": "expense"})], "xero"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_CLASSIFICATION");
        assert_eq!(body["success"], false);

        let response = server
            .post("/api/transactions")
            .json(&bulk(vec![json!({"memo": "no id"})], "xero"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_PAYLOAD");

        let response = server
            .post("/api/journal-entries")
            .json(&json!({"records": [], "connectionId": "", "integrationId": "xero"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // nothing from the rejected batches was written
        let body: Value = server.get("/api/transactions").await.json();
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_list_pagination_and_ordering() {
        let server = server().await;
        let records = vec![
            invoice("a", "oldest", "2025-01-01"),
            invoice("b", "middle", "2025-02-01"),
            invoice("c", "newest", "2025-03-01"),
        ];
        server
            .post("/api/transactions")
            .json(&bulk(records, "quickbooks"))
            .await
            .assert_status(StatusCode::OK);

        let body: Value = server.get("/api/transactions?limit=2&offset=1").await.json();
        assert_eq!(body["total"], 3);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["offset"], 1);
        let ids: Vec<&str> = body["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["externalId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        server
            .get("/api/transactions?limit=0")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/api/transactions?limit=501")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server.get("/api/transactions?classification=expense").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_CLASSIFICATION");
    }

    #[tokio::test]
    async fn test_count_only_totals_match_and_follow_writes() {
        let server = server().await;
        server
            .post("/api/transactions")
            .json(&bulk(
                vec![invoice("q1", "", "2025-01-01"), invoice("q2", "", "2025-01-02")],
                "quickbooks",
            ))
            .await
            .assert_status(StatusCode::OK);
        server
            .post("/api/transactions")
            .json(&bulk(vec![invoice("x1", "", "2025-01-01")], "xero"))
            .await
            .assert_status(StatusCode::OK);

        let body: Value = server.get("/api/transactions?countOnly=true").await.json();
        let sum: u64 = body["counts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["count"].as_u64().unwrap())
            .sum();
        assert_eq!(body["total"], 3);
        assert_eq!(sum, 3);

        let body: Value = server
            .get("/api/transactions?countOnly=true&integrationId=xero")
            .await
            .json();
        assert_eq!(body["total"], 1);

        // a write drops the cached counts
        server
            .post("/api/transactions")
            .json(&bulk(vec![invoice("x2", "", "2025-01-05")], "xero"))
            .await
            .assert_status(StatusCode::OK);
        let body: Value = server.get("/api/transactions?countOnly=true").await.json();
        assert_eq!(body["total"], 4);
    }

    #[tokio::test]
    async fn test_ledger_accounts_accept_any_classification() {
        let server = server().await;
        let accounts = vec![
            json!({"id": "1", "name": "Cash", "type": "bank", "classification": "asset", "currentBalance": "10.00"}),
            json!({"id": "2", "name": "Accounts Payable", "classification": "liability"}),
        ];
        server
            .post("/api/ledger-accounts")
            .json(&bulk(accounts, "netsuite"))
            .await
            .assert_status(StatusCode::OK);

        let body: Value = server
            .get("/api/ledger-accounts?classification=asset")
            .await
            .json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["records"][0]["name"], "Cash");
        assert_eq!(body["records"][0]["type"], "bank");

        let body: Value = server.get("/api/ledger-accounts").await.json();
        assert_eq!(body["records"][0]["name"], "Accounts Payable");
    }

    #[tokio::test]
    async fn test_server_side_import_is_idempotent() {
        let first = vec![
            json!({"id": "1", "memo": "one", "classification": "whatever"}),
            json!({"id": "2", "memo": "two"}),
            json!({"id": "3", "memo": "three"}),
        ];
        let client = StaticClient::default().with_records("c1", "get-invoices", first);
        let server = TestServer::new(setup_test_app_with_client(client).await).unwrap();
        let request = json!({
            "connections": [
                {"connectionId": "c1", "integrationId": "quickbooks", "integrationName": "QuickBooks"}
            ],
            "userId": "user-7"
        });

        for _ in 0..2 {
            let response = server.post("/api/imports/transactions").json(&request).await;
            response.assert_status(StatusCode::OK);
            let body: Value = response.json();
            assert_eq!(body["success"], true);
            assert_eq!(body["totalImported"], 3);
            assert_eq!(body["results"][0]["success"], true);
        }

        let body: Value = server.get("/api/transactions").await.json();
        assert_eq!(body["total"], 3);
        for record in body["records"].as_array().unwrap() {
            assert_eq!(record["classification"], "invoice");
            assert_eq!(record["userId"], "user-7");
            assert_eq!(record["integrationName"], "QuickBooks");
        }
    }

    #[tokio::test]
    async fn test_import_reports_failures_per_connection() {
        let client = StaticClient::default().with_records(
            "c1",
            "get-ledger-accounts",
            vec![json!({"id": "100", "name": "Sales"})],
        );
        let server = TestServer::new(setup_test_app_with_client(client).await).unwrap();

        let response = server
            .post("/api/imports/ledger-accounts")
            .json(&json!({
                "connections": [
                    {"connectionId": "c1", "integrationId": "xero"},
                    {"connectionId": "c2", "integrationId": "hubspot"}
                ]
            }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["totalImported"], 1);
        assert_eq!(body["results"][0]["success"], true);
        assert_eq!(body["results"][1]["success"], false);
        assert!(body["results"][1]["error"]
            .as_str()
            .unwrap()
            .contains("not an accounting integration"));
    }

    #[tokio::test]
    async fn test_slow_import_is_not_cut_off_by_request_timeout() {
        let client = StaticClient::default()
            .with_records(
                "c1",
                "get-ledger-accounts",
                vec![json!({"id": "100", "name": "Sales"}), json!({"id": "200", "name": "Bank"})],
            )
            .with_delay(Duration::from_millis(1500));
        let server = TestServer::new(setup_test_app_with_client(client).await).unwrap();

        let response = server
            .post("/api/imports/ledger-accounts")
            .json(&json!({"connections": [{"connectionId": "c1", "integrationId": "xero"}]}))
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["totalImported"], 2);

        let body: Value = server.get("/api/ledger-accounts").await.json();
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_import_errors() {
        let server = server().await;
        let request = json!({"connections": [{"connectionId": "c1", "integrationId": "xero"}]});

        let response = server.post("/api/imports/transactions").json(&request).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["code"], "IMPORT_ERROR");

        let response = server.post("/api/imports/invoices").json(&request).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "UNKNOWN_RESOURCE");

        server
            .post("/api/imports/transactions")
            .json(&json!({"connections": []}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_requires_token_before_payload() {
        let server = server().await;

        let response = server
            .post("/webhooks/transactions")
            .json(&json!({"garbage": true}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

        let forged = crate::auth::sign_token(&json!({"id": "u"}), "another-secret");
        server
            .post("/webhooks/transactions")
            .add_header(token_header(), HeaderValue::from_str(&forged).unwrap())
            .json(&json!({"garbage": true}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/webhooks/transactions")
            .add_header(token_header(), token_value("u"))
            .json(&json!({"garbage": true}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_create_then_update() {
        let server = server().await;
        let created = json!({
            "connectionId": "c1",
            "fields": {
                "id": "je-1",
                "integrationId": "quickbooks",
                "integrationName": "QuickBooks",
                "data": {
                    "memo": "accrual",
                    "classification": "journal-entry",
                    "lineItems": [
                        {"amount": "10", "type": "debit"},
                        {"amount": "10", "type": "credit"}
                    ]
                }
            }
        });

        let response = server
            .post("/webhooks/journal-entries")
            .add_header(token_header(), token_value("user-9"))
            .json(&created)
            .await;
        response.assert_status(StatusCode::OK);
        let first: Value = response.json();
        assert_eq!(first["action"], "created");
        assert_eq!(first["externalId"], "je-1");
        assert_eq!(first["userId"], "user-9");
        assert_eq!(first["classification"], "journal-entry");

        // no lineItems and no integration name: both keep their stored values
        let updated = json!({
            "connectionId": "c1",
            "fields": {"id": "je-1", "data": {"memo": "accrual, reversed"}}
        });
        let response = server
            .post("/webhooks/journal-entries")
            .add_header(token_header(), token_value("user-9"))
            .json(&updated)
            .await;
        response.assert_status(StatusCode::OK);
        let second: Value = response.json();
        assert_eq!(second["action"], "updated");
        assert_eq!(second["id"], first["id"]);
        assert_eq!(second["integrationName"], "QuickBooks");

        let body: Value = server.get("/api/journal-entries").await.json();
        assert_eq!(body["total"], 1);
        let stored = &body["records"][0];
        assert_eq!(stored["memo"], "accrual, reversed");
        assert_eq!(stored["integrationId"], "quickbooks");
        assert_eq!(stored["lineItems"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_webhook_rejects_unknown_classification() {
        let server = server().await;
        let response = server
            .post("/webhooks/transactions")
            .add_header(token_header(), token_value("u"))
            .json(&json!({
                "connectionId": "c1",
                "fields": {"id": "t1", "classification": "expense", "data": {}}
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_CLASSIFICATION");
    }

    #[tokio::test]
    async fn test_webhook_classification_overrides_data() {
        let server = server().await;
        let response = server
            .post("/webhooks/transactions")
            .add_header(token_header(), token_value("u"))
            .json(&json!({
                "connectionId": "c1",
                "fields": {
                    "id": "t1",
                    "integrationId": "xero",
                    "classification": "invoice",
                    "data": {"classification": "bill", "memo": "m"}
                }
            }))
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["classification"], "invoice");

        let body: Value = server.get("/api/transactions").await.json();
        assert_eq!(body["records"][0]["classification"], "invoice");
    }

    #[tokio::test]
    async fn test_webhook_delete() {
        let server = server().await;

        let response = server
            .delete("/webhooks/transactions")
            .add_header(token_header(), token_value("user-2"))
            .json(&json!({"connectionId": "c1", "externalTransactionId": "never-imported"}))
            .await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["action"], "not_found");
        assert_eq!(body["externalId"], "never-imported");
        assert_eq!(body["userId"], "user-2");

        server
            .post("/api/transactions")
            .json(&json!({
                "records": [invoice("t1", "", "2025-01-01")],
                "connectionId": "c1",
                "integrationId": "xero"
            }))
            .await
            .assert_status(StatusCode::OK);

        let response = server
            .delete("/webhooks/transactions")
            .add_header(token_header(), token_value("user-2"))
            .json(&json!({"connectionId": "c1", "externalId": "t1"}))
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["action"], "deleted");

        let body: Value = server.get("/api/transactions").await.json();
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_webhook_status() {
        let server = server().await;

        let response = server.get("/webhooks/ledger-accounts").await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "ledger-accounts webhook endpoint active");

        server
            .get("/webhooks/contacts")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_prometheus_metrics_endpoint() {
        let server = server().await;

        // The recorder is only installed outside of tests
        let response = server.get("/metrics").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
