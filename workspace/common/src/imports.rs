use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// The three kinds of imported data, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Transactions,
    JournalEntries,
    LedgerAccounts,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Transactions => "transactions",
            Resource::JournalEntries => "journal-entries",
            Resource::LedgerAccounts => "ledger-accounts",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transactions" => Ok(Resource::Transactions),
            "journal-entries" => Ok(Resource::JournalEntries),
            "ledger-accounts" => Ok(Resource::LedgerAccounts),
            other => Err(format!(
                "unknown resource '{other}', expected transactions, journal-entries or ledger-accounts"
            )),
        }
    }
}

/// Provenance injected into every record written for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportContext {
    pub connection_id: String,
    pub integration_id: String,
    pub integration_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ImportContext {
    pub fn new(
        connection_id: impl Into<String>,
        integration_id: impl Into<String>,
        integration_name: Option<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            integration_id: integration_id.into(),
            integration_name,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Outcome of importing one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub connection_id: String,
    pub success: bool,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportResult {
    pub fn succeeded(context: &ImportContext, count: u64) -> Self {
        Self {
            integration_id: context.integration_id.clone(),
            integration_name: context.integration_name.clone(),
            connection_id: context.connection_id.clone(),
            success: true,
            count,
            error: None,
        }
    }

    pub fn failed(context: &ImportContext, error: impl Into<String>) -> Self {
        Self {
            integration_id: context.integration_id.clone(),
            integration_name: context.integration_name.clone(),
            connection_id: context.connection_id.clone(),
            success: false,
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Counts reported by one bulk upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct UpsertSummary {
    /// Keys that did not exist before the write.
    pub inserted: u64,
    /// Keys that existed and were overwritten.
    pub modified: u64,
    /// Number of records submitted, duplicates included.
    pub total: u64,
}

/// Per-integration row of the grouped count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCount {
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeleteAction {
    Deleted,
    NotFound,
}
