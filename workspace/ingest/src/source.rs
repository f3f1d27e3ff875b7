//! Client side of the integration API: one trait for "run an action on a
//! connection" and its reqwest implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

use crate::error::{IngestError, Result};

/// A record as the integration API returns it, before normalization.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Unified field set produced by the integration's field mapping.
    pub fields: Map<String, Value>,
    /// Payload exactly as the external system sent it, when the API exposes it.
    pub raw_fields: Option<Value>,
    pub created_time: Option<String>,
    pub updated_time: Option<String>,
}

impl ExternalRecord {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: Some(id.into()),
            fields,
            ..Default::default()
        }
    }
}

/// Record ids arrive as strings or, from some integrations, as integers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(de::Error::custom(format!("unsupported record id {other}"))),
    }
}

/// One page of an action run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionPage {
    pub records: Vec<ExternalRecord>,
    /// Opaque continuation token; `None` when this was the last page.
    pub cursor: Option<String>,
}

/// Runs named actions ("get-invoices", "get-ledger-accounts", ...) against a
/// connection of the integration platform.
#[async_trait]
pub trait ActionClient: Send + Sync {
    async fn run_action(
        &self,
        connection_id: &str,
        action: &str,
        cursor: Option<&str>,
    ) -> Result<ActionPage>;
}

#[derive(Debug, Serialize)]
struct RunActionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RunActionResponse {
    #[serde(default)]
    output: Option<Value>,
}

/// reqwest-backed [`ActionClient`] for the hosted integration API.
#[derive(Clone)]
pub struct IntegrationAppClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl IntegrationAppClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn action_url(&self, connection_id: &str, action: &str) -> String {
        format!(
            "{}/connections/{}/actions/{}/run",
            self.base_url, connection_id, action
        )
    }
}

/// Extracts records and cursor from the `output` of an action run. Anything
/// that is not an array of records counts as an empty page.
fn parse_output(output: Option<Value>) -> ActionPage {
    let Some(output) = output else {
        return ActionPage::default();
    };

    let records = match output.get("records") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value::<ExternalRecord>(item.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed record in action output: {}", e);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    let cursor = output
        .get("cursor")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    ActionPage { records, cursor }
}

#[async_trait]
impl ActionClient for IntegrationAppClient {
    #[instrument(skip(self))]
    async fn run_action(
        &self,
        connection_id: &str,
        action: &str,
        cursor: Option<&str>,
    ) -> Result<ActionPage> {
        trace!("Entering run_action");

        let mut request = self
            .client
            .post(self.action_url(connection_id, action))
            .json(&RunActionRequest { cursor });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Integration API returned {} for action {}", status, action);
            return Err(IngestError::Upstream {
                action: action.to_string(),
                status: status.as_u16(),
            });
        }

        let body: RunActionResponse = response.json().await?;
        let page = parse_output(body.output);
        debug!(
            "Action {} returned {} records (has_cursor={})",
            action,
            page.records.len(),
            page.cursor.is_some()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numeric_record_ids() {
        let page = parse_output(Some(json!({
            "records": [
                {"id": 1042, "fields": {"memo": "numeric"}},
                {"fields": {"id": "x"}},
                {"id": {"nested": true}, "fields": {}}
            ]
        })));

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id.as_deref(), Some("1042"));
        assert_eq!(page.records[1].id, None);
    }

    #[test]
    fn parses_records_and_cursor() {
        let page = parse_output(Some(json!({
            "records": [
                {"id": "1", "fields": {"id": "INV-1", "totalAmount": 10}, "createdTime": "2024-01-01T00:00:00Z"},
                {"id": "2", "fields": {"id": "INV-2"}}
            ],
            "cursor": "next-page"
        })));

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].fields["id"], "INV-1");
        assert_eq!(page.records[0].created_time.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(page.cursor.as_deref(), Some("next-page"));
    }

    #[test]
    fn missing_records_is_an_empty_page() {
        assert_eq!(parse_output(None), ActionPage::default());
        assert_eq!(parse_output(Some(json!({"records": "nope"}))).records.len(), 0);
    }

    #[test]
    fn empty_cursor_means_last_page() {
        let page = parse_output(Some(json!({"records": [], "cursor": ""})));
        assert!(page.cursor.is_none());
    }

    #[test]
    fn action_url_joins_without_double_slash() {
        let client = IntegrationAppClient::new("https://api.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.action_url("c1", "get-invoices"),
            "https://api.example.com/connections/c1/actions/get-invoices/run"
        );
    }
}
