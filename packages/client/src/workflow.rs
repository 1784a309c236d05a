//! n8n workflow triggers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use incident_map_incident_models::IncidentCategory;
use serde::Serialize;
use serde_json::Value;

use crate::{ClientError, join_url, status_error, workflow_registry::WorkflowDefinition};

/// Body posted to every workflow webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPayload {
    pub latitude: f64,
    pub longitude: f64,
    /// Place name the user searched for, or "Current map area".
    pub location: String,
    /// Request time, RFC 3339 with millisecond precision.
    pub timestamp: String,
}

impl WorkflowPayload {
    #[must_use]
    pub fn new(
        latitude: f64,
        longitude: f64,
        location: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            location: location.into(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Something that, given a location, returns incidents of one category.
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Category the returned incidents belong to.
    fn category(&self) -> IncidentCategory;

    /// Runs the workflow for a location.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the call fails or the response can't be
    /// decoded.
    async fn trigger(&self, payload: &WorkflowPayload) -> Result<Vec<Value>, ClientError>;
}

/// Pulls the incident list out of a workflow response.
///
/// Workflows answer with a bare array, or an object wrapping it under
/// `items` or `data`. Anything else yields no incidents.
#[must_use]
pub fn normalize_response(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(items)) => items,
            _ => match obj.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    }
}

/// Triggers an n8n webhook over HTTP.
#[derive(Debug, Clone)]
pub struct HttpWorkflowTrigger {
    client: reqwest::Client,
    url: String,
    category: IncidentCategory,
    timeout: Option<Duration>,
}

impl HttpWorkflowTrigger {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        category: IncidentCategory,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            category,
            timeout: None,
        }
    }

    /// Builds a trigger for a registry entry, rooted at `base_url`.
    #[must_use]
    pub fn from_definition(
        client: reqwest::Client,
        base_url: &str,
        definition: &WorkflowDefinition,
    ) -> Self {
        Self {
            timeout: definition.timeout_secs.map(Duration::from_secs),
            ..Self::new(
                client,
                join_url(base_url, &definition.path),
                definition.category,
            )
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WorkflowTrigger for HttpWorkflowTrigger {
    fn category(&self) -> IncidentCategory {
        self.category
    }

    async fn trigger(&self, payload: &WorkflowPayload) -> Result<Vec<Value>, ClientError> {
        log::info!(
            "Triggering {} workflow for {} ({}, {})",
            self.category,
            payload.location,
            payload.latitude,
            payload.longitude
        );

        let mut request = self.client.post(&self.url).json(payload);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(&self.url, resp).await);
        }

        let body: Value = resp.json().await.map_err(|e| ClientError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        let incidents = normalize_response(body);

        log::debug!("{} workflow returned {} incidents", self.category, incidents.len());
        Ok(incidents)
    }
}
