//! Day-partitioned, offset-paginated billing query.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;

use super::types::{BillingEntry, BillingPage};
use super::window::{day_bounds, DateWindow, DayOrder};
use crate::error::BillingError;
use crate::util::retry::RetryPolicy;

/// Entries per page; the API never returns more.
pub const BILLING_PAGE_SIZE: usize = 100;
pub const DEFAULT_API_BASE_URL: &str = "https://api.allegro.pl";
const BILLING_MEDIA_TYPE: &str = "application/vnd.allegro.public.v1+json";
const ERROR_BODY_LIMIT: usize = 512;

/// Pulls every billing entry in a window, one day at a time.
///
/// # Example
/// ```no_run
/// use std::collections::BTreeSet;
/// use std::time::Duration;
/// use chrono::NaiveDate;
/// use allegro_billing::billing::{DateWindow, PaginatedFetcher};
///
/// # async fn example() -> allegro_billing::error::Result<()> {
/// let fetcher = PaginatedFetcher::new(Duration::from_secs(30))?;
/// let day = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
/// let entries = fetcher
///     .fetch(&DateWindow::single(day), "access-token", &BTreeSet::new())
///     .await?;
/// println!("{} entries", entries.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    order: DayOrder,
}

impl PaginatedFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            order: DayOrder::default(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_day_order(mut self, order: DayOrder) -> Self {
        self.order = order;
        self
    }

    /// Fetch all entries for every day of `window`.
    ///
    /// Days are concatenated in the configured order; nothing is de-duplicated.
    #[tracing::instrument(skip_all, fields(start = %window.start(), end = %window.end()))]
    pub async fn fetch(
        &self,
        window: &DateWindow,
        bearer_token: &str,
        entry_types: &BTreeSet<String>,
    ) -> Result<Vec<BillingEntry>, BillingError> {
        let mut entries = Vec::new();
        for day in window.days(self.order) {
            let day_entries = self.fetch_day(day, bearer_token, entry_types).await?;
            tracing::info!(%day, entries = day_entries.len(), "Fetched billing day");
            entries.extend(day_entries);
        }
        Ok(entries)
    }

    /// Page through one day until a short page arrives.
    ///
    /// A full page always triggers one more request, so a day holding an
    /// exact multiple of the page size ends with an empty page.
    pub async fn fetch_day(
        &self,
        day: NaiveDate,
        bearer_token: &str,
        entry_types: &BTreeSet<String>,
    ) -> Result<Vec<BillingEntry>, BillingError> {
        let (gte, lte) = day_bounds(day);
        let mut entries = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = self
                .retry
                .execute(|| self.fetch_page(bearer_token, entry_types, offset, &gte, &lte))
                .await?;
            let count = page.len();
            if count > BILLING_PAGE_SIZE {
                return Err(BillingError::Protocol(format!(
                    "page at offset {offset} for {day} held {count} entries, limit is {BILLING_PAGE_SIZE}"
                )));
            }
            entries.extend(page);
            if count < BILLING_PAGE_SIZE {
                break;
            }
            offset += BILLING_PAGE_SIZE;
        }
        Ok(entries)
    }

    async fn fetch_page(
        &self,
        bearer_token: &str,
        entry_types: &BTreeSet<String>,
        offset: usize,
        gte: &str,
        lte: &str,
    ) -> Result<Vec<BillingEntry>, BillingError> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(entry_types.len() + 3);
        query.push(("offset", offset.to_string()));
        for entry_type in entry_types {
            query.push(("type.id", entry_type.clone()));
        }
        query.push(("occurredAt.gte", gte.to_string()));
        query.push(("occurredAt.lte", lte.to_string()));

        let url = format!("{}/billing/billing-entries", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .header("Accept", BILLING_MEDIA_TYPE)
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            return Err(BillingError::RateLimited { retry_after_secs });
        }
        let body = resp.text().await?;
        if !status.is_success() {
            let message: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(BillingError::api(status.as_u16(), message));
        }

        let page: BillingPage = serde_json::from_str(&body)
            .map_err(|e| BillingError::Protocol(format!("Malformed billing page: {e}")))?;
        tracing::debug!(offset, entries = page.billing_entries.len(), "Fetched billing page");
        Ok(page.billing_entries)
    }
}
