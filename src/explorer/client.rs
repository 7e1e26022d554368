use std::time::Duration;

use alloy::primitives::Address;
use reqwest::StatusCode;

use super::types::{self, Cursor, FetchError, TransactionsPage, TxRecord};

/// Bound on a single explorer request so a hung connection cannot stall the
/// poll loop past its own cycle.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only client for a Blockscout-style explorer API.
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExplorerClient {
    pub fn new(base_url: &str) -> eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| eyre::eyre!("Failed to build explorer HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch transactions touching `address` since the cursor.
    ///
    /// The explorer pages newest-first; the page is trimmed at the cursor
    /// and returned oldest-first, ready to fold in discovery order. Records
    /// at the cursor's exact timestamp may be redelivered — the statistics
    /// store deduplicates by hash.
    pub async fn fetch_transactions(
        &self,
        address: Address,
        cursor: Option<&Cursor>,
    ) -> Result<Vec<TxRecord>, FetchError> {
        let url = format!(
            "{}/api/v2/addresses/{}/transactions",
            self.base_url, address
        );

        let response = self
            .http
            .get(&url)
            .query(&[("filter", "to | from")])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(format!(
                "explorer returned {} for {}",
                status, url
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!(
                "explorer returned {} for {}",
                status, url
            )));
        }

        let page: TransactionsPage = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let mut fresh = Vec::new();
        for item in &page.items {
            let record = types::normalize(item);
            if let Some(cursor) = cursor {
                if record.hash() == Some(cursor.hash) {
                    break;
                }
                if let Some(ts) = record.timestamp() {
                    if ts < cursor.timestamp {
                        break;
                    }
                }
            }
            fresh.push(record);
        }
        fresh.reverse();

        Ok(fresh)
    }
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Network(format!("explorer request timed out: {}", e))
    } else {
        FetchError::Network(e.to_string())
    }
}
