//! Dashboard analytics API service
//!
//! Every figure is computed by the backend; these calls only route requests
//! through the gateway and hand the JSON payload back untouched.

use crate::gateway::{ApiRequest, RequestGateway};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use upsell_http::ClientError;

/// Inclusive reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Window between two dates, in whichever order they are given
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// The `days` days ending at `today`, both inclusive
    pub fn last_days(today: NaiveDate, days: u64) -> Self {
        let start = today
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    fn apply(&self, request: ApiRequest) -> ApiRequest {
        request.query("start", self.start).query("end", self.end)
    }
}

/// Analytics API service
#[derive(Clone, Debug)]
pub struct AnalyticsService {
    gateway: RequestGateway,
}

impl AnalyticsService {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// Locations visible to the current user
    pub async fn locations(&self) -> Result<Value, ClientError> {
        self.gateway.get("/api/locations").await
    }

    /// Upsell, upsize and add-on conversion plus revenue for one location
    pub async fn location_metrics(
        &self,
        location_id: &str,
        range: &DateRange,
    ) -> Result<Value, ClientError> {
        let request = range.apply(ApiRequest::get(format!(
            "/api/locations/{location_id}/metrics"
        )));
        self.gateway.send(request).await
    }

    /// Runs recorded at a location
    pub async fn runs(&self, location_id: &str) -> Result<Value, ClientError> {
        self.gateway
            .get(&format!("/api/locations/{location_id}/runs"))
            .await
    }

    /// Metrics for a single run
    pub async fn run(&self, run_id: &str) -> Result<Value, ClientError> {
        self.gateway.get(&format!("/api/runs/{run_id}")).await
    }

    /// One page of the transaction drill-down of a run
    pub async fn run_transactions(&self, run_id: &str, page: u32) -> Result<Value, ClientError> {
        let request =
            ApiRequest::get(format!("/api/runs/{run_id}/transactions")).query("page", page);
        self.gateway.send(request).await
    }

    /// Operator leaderboard for a location
    pub async fn leaderboard(
        &self,
        location_id: &str,
        range: &DateRange,
    ) -> Result<Value, ClientError> {
        let request = range.apply(ApiRequest::get(format!(
            "/api/locations/{location_id}/leaderboard"
        )));
        self.gateway.send(request).await
    }
}
