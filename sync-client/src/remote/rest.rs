//! HTTP remote backend speaking a PostgREST-style API.
//!
//! Each entity table lives at `{url}/rest/v1/{table}`. Rows are filtered
//! with `column=eq.value` query parameters and upserts use the
//! `Prefer: resolution=merge-duplicates` header.

use std::time::Duration;

use async_trait::async_trait;
use hearth_sync_types::EntityKind;
use reqwest::{RequestBuilder, Response};

use super::{row_id, with_owner, Identity, RemoteBackend, RemoteError, Row, OWNER_COLUMN};
use crate::config::RemoteConfig;

/// Remote backend over HTTP.
pub struct RestRemote {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    user_id: Option<String>,
}

impl RestRemote {
    /// Create a client from `config`.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            user_id: config.user_id.clone(),
        })
    }

    /// Build the URL for an entity table.
    pub fn table_url(&self, table: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.table())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        request.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn post(
        &self,
        table: EntityKind,
        owner: &Identity,
        row: Row,
        prefer: &str,
    ) -> Result<(), RemoteError> {
        let row = with_owner(row, owner)?;
        let id = row_id(&row)?.to_string();
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", prefer)
            .json(&row);

        self.execute(request).await?;
        tracing::debug!(table = table.table(), id = %id, prefer, "Wrote remote row");
        Ok(())
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(e.to_string())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl RemoteBackend for RestRemote {
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }

    async fn identity(&self) -> Option<Identity> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(Identity::new)
    }

    async fn select(&self, table: EntityKind, owner: &Identity) -> Result<Vec<Row>, RemoteError> {
        let request = self
            .http
            .get(self.table_url(table))
            .query(&[(OWNER_COLUMN, eq(&owner.user_id)), ("select", "*".into())]);

        let rows: Vec<Row> = self
            .execute(request)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::InvalidRow(e.to_string()))?;

        tracing::debug!(table = table.table(), rows = rows.len(), "Fetched remote rows");
        Ok(rows)
    }

    async fn insert(
        &self,
        table: EntityKind,
        owner: &Identity,
        row: Row,
    ) -> Result<(), RemoteError> {
        self.post(table, owner, row, "return=minimal").await
    }

    async fn upsert(
        &self,
        table: EntityKind,
        owner: &Identity,
        row: Row,
    ) -> Result<(), RemoteError> {
        self.post(table, owner, row, "resolution=merge-duplicates,return=minimal")
            .await
    }

    async fn delete(&self, table: EntityKind, owner: &Identity, id: &str) -> Result<(), RemoteError> {
        let request = self
            .http
            .delete(self.table_url(table))
            .query(&[("id", eq(id)), (OWNER_COLUMN, eq(&owner.user_id))]);

        self.execute(request).await?;
        tracing::debug!(table = table.table(), id, "Deleted remote row");
        Ok(())
    }
}

impl std::fmt::Debug for RestRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestRemote")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            url: "https://db.example.com/".into(),
            api_key: "anon-key".into(),
            access_token: Some("session-token".into()),
            user_id: Some("u-123".into()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn table_url_uses_table_name() {
        let remote = RestRemote::new(&config()).unwrap();
        assert_eq!(
            remote.table_url(EntityKind::Journal),
            "https://db.example.com/rest/v1/journal_entries"
        );
        assert_eq!(
            remote.table_url(EntityKind::Mood),
            "https://db.example.com/rest/v1/moods"
        );
    }

    #[tokio::test]
    async fn configured_with_identity() {
        let remote = RestRemote::new(&config()).unwrap();
        assert!(remote.is_configured());
        assert_eq!(remote.identity().await, Some(Identity::new("u-123")));
    }

    #[tokio::test]
    async fn missing_credentials_are_unconfigured() {
        let mut cfg = config();
        cfg.api_key = String::new();
        cfg.user_id = None;

        let remote = RestRemote::new(&cfg).unwrap();
        assert!(!remote.is_configured());
        assert_eq!(remote.identity().await, None);
    }

    #[test]
    fn debug_hides_credentials() {
        let remote = RestRemote::new(&config()).unwrap();
        let debug = format!("{:?}", remote);
        assert!(!debug.contains("anon-key"));
        assert!(!debug.contains("session-token"));
    }
}
