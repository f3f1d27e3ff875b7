//! Cursor pagination over an integration action.

use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

use crate::error::{IngestError, Result};
use crate::source::{ActionClient, ExternalRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Pause between two pages of the same action.
    pub page_delay: Duration,
    /// Upper bound on pages per action; reaching it fails the fetch.
    pub max_pages: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(100),
            max_pages: 500,
        }
    }
}

/// Runs `action` on `connection_id` until the integration stops handing out
/// cursors, returning every record in page order.
///
/// A page without a cursor or without records ends the fetch. The delay is
/// only awaited when another page will be requested.
#[instrument(skip(client, options), fields(max_pages = options.max_pages))]
pub async fn fetch_all(
    client: &dyn ActionClient,
    connection_id: &str,
    action: &str,
    options: &FetchOptions,
) -> Result<Vec<ExternalRecord>> {
    trace!("Entering fetch_all");

    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        if pages >= options.max_pages {
            warn!(
                "Action {} on connection {} still has pages after {} requests",
                action, connection_id, pages
            );
            return Err(IngestError::PageLimitExceeded {
                action: action.to_string(),
                max_pages: options.max_pages,
            });
        }

        let page = client
            .run_action(connection_id, action, cursor.as_deref())
            .await?;
        pages += 1;

        let page_was_empty = page.records.is_empty();
        trace!("Page {} of {} returned {} records", pages, action, page.records.len());
        records.extend(page.records);

        match page.cursor {
            Some(next) if !page_was_empty => {
                cursor = Some(next);
                if !options.page_delay.is_zero() {
                    tokio::time::sleep(options.page_delay).await;
                }
            }
            _ => break,
        }
    }

    debug!(
        "Fetched {} records for {} on connection {} in {} pages",
        records.len(),
        action,
        connection_id,
        pages
    );
    Ok(records)
}
