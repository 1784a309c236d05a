//! Storage API client.

use async_trait::async_trait;
use incident_map_server_models::{ApiClearResponse, ApiHealth, ApiSaveResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClientConfig, ClientError, join_url, status_error};

/// Operations the client performs against the storage API.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// Replaces the collection stored under `category`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server reports an
    /// error.
    async fn save(&self, category: &str, incidents: &[Value])
    -> Result<ApiSaveResponse, ClientError>;

    /// Fetches the collection stored under `category`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the body isn't an
    /// array.
    async fn load(&self, category: &str) -> Result<Vec<Value>, ClientError>;

    /// Empties the collection stored under `category`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails.
    async fn clear(&self, category: &str) -> Result<ApiClearResponse, ClientError>;

    /// Empties every known category in one request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails.
    async fn clear_all(&self) -> Result<ApiClearResponse, ClientError>;

    /// Checks that the server is up.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails.
    async fn health(&self) -> Result<ApiHealth, ClientError>;
}

/// [`IncidentApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIncidentApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIncidentApi {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Client for the API at `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client can't be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(crate::http_client()?, config.api_url.clone()))
    }

    #[must_use]
    pub fn incidents_url(&self, category: &str) -> String {
        join_url(&self.base_url, &format!("api/incidents/{category}"))
    }

    #[must_use]
    pub fn all_incidents_url(&self) -> String {
        join_url(&self.base_url, "api/incidents")
    }

    async fn read<T: DeserializeOwned>(
        url: &str,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        if !resp.status().is_success() {
            return Err(status_error(url, resp).await);
        }

        resp.json().await.map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl IncidentApi for HttpIncidentApi {
    async fn save(
        &self,
        category: &str,
        incidents: &[Value],
    ) -> Result<ApiSaveResponse, ClientError> {
        let url = self.incidents_url(category);
        log::debug!("Saving {} {category} incidents to {url}", incidents.len());
        let resp = self.client.post(&url).json(incidents).send().await?;
        Self::read(&url, resp).await
    }

    async fn load(&self, category: &str) -> Result<Vec<Value>, ClientError> {
        let url = self.incidents_url(category);
        let resp = self.client.get(&url).send().await?;
        match Self::read::<Value>(&url, resp).await? {
            Value::Array(items) => Ok(items),
            other => Err(ClientError::Decode {
                url,
                message: format!("expected an array, got {other}"),
            }),
        }
    }

    async fn clear(&self, category: &str) -> Result<ApiClearResponse, ClientError> {
        let url = self.incidents_url(category);
        let resp = self.client.delete(&url).send().await?;
        Self::read(&url, resp).await
    }

    async fn clear_all(&self) -> Result<ApiClearResponse, ClientError> {
        let url = self.all_incidents_url();
        let resp = self.client.delete(&url).send().await?;
        Self::read(&url, resp).await
    }

    async fn health(&self) -> Result<ApiHealth, ClientError> {
        let url = join_url(&self.base_url, "health");
        let resp = self.client.get(&url).send().await?;
        Self::read(&url, resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_urls_are_per_category() {
        let api = HttpIncidentApi::new(reqwest::Client::new(), "http://localhost:3000/");
        assert_eq!(
            api.incidents_url("criminal"),
            "http://localhost:3000/api/incidents/criminal"
        );
    }

    #[test]
    fn clear_all_targets_the_collection_root() {
        let api = HttpIncidentApi::new(reqwest::Client::new(), "http://localhost:3000/");
        assert_eq!(api.all_incidents_url(), "http://localhost:3000/api/incidents");
    }
}
