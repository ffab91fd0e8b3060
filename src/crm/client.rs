use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

use super::{CrmClient, CrmError};
use crate::config::{ConfigError, SalesforceConfig};
use crate::models::{AccountFields, CrmRecord};

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    records: Vec<CrmRecord>,
}

/// Salesforce REST client using the OAuth2 client-credentials flow.
#[derive(Debug)]
pub struct SalesforceClient {
    http: Client,
    login_url: String,
    client_id: String,
    client_secret: String,
    api_version: String,
    session: RwLock<Option<Session>>,
}

impl SalesforceClient {
    pub fn new(
        login_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CrmError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            login_url: login_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_version: api_version.into(),
            session: RwLock::new(None),
        })
    }

    pub fn from_config(config: &SalesforceConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let instance_url = config.require_instance_url()?;
        let client_id = config.require_client_id()?;
        let client_secret = config.require_client_secret()?;

        Self::new(
            instance_url,
            client_id,
            client_secret,
            config.api_version.clone(),
            timeout,
        )
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }

    async fn session(&self) -> Result<Session, CrmError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(CrmError::NotAuthenticated)
    }

    fn api_base(&self, session: &Session) -> String {
        format!(
            "{}/services/data/{}",
            session.instance_url.trim_end_matches('/'),
            self.api_version
        )
    }

    fn account_url(&self, session: &Session, id: Option<&str>) -> String {
        format!(
            "{}/sobjects/Account/{}",
            self.api_base(session),
            id.unwrap_or_default()
        )
    }

    async fn api_error(operation: &'static str, response: Response) -> CrmError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(operation, status, body = %body, "Salesforce request failed");
        CrmError::Api {
            operation,
            status,
            body,
        }
    }
}

/// Quote-escape a value for use inside a SOQL string literal.
pub fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl CrmClient for SalesforceClient {
    async fn authenticate(&self) -> Result<(), CrmError> {
        let token_url = format!("{}/services/oauth2/token", self.login_url);
        info!(url = %token_url, "SF: authenticating");

        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "SF auth failed");
            return Err(CrmError::Auth { status, body });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(format!("token response: {e}")))?;

        info!(instance = %token.instance_url, "SF: auth OK");
        *self.session.write().await = Some(Session {
            access_token: token.access_token,
            instance_url: token.instance_url,
        });
        Ok(())
    }

    async fn create_account(&self, fields: &AccountFields) -> Result<String, CrmError> {
        let session = self.session().await?;
        info!(name = ?fields.name, "SF: create Account");

        let response = self
            .http
            .post(self.account_url(&session, None))
            .bearer_auth(&session.access_token)
            .json(fields)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(Self::api_error("create", response).await);
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(format!("create response: {e}")))?;
        Ok(created.id)
    }

    async fn update_account(&self, id: &str, fields: &AccountFields) -> Result<(), CrmError> {
        let session = self.session().await?;
        info!(account_id = %id, "SF: update Account");

        let response = self
            .http
            .patch(self.account_url(&session, Some(id)))
            .bearer_auth(&session.access_token)
            .json(fields)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => {
                error!(account_id = %id, "SF update failed: record not found");
                Err(CrmError::NotFound { id: id.to_string() })
            }
            _ => Err(Self::api_error("update", response).await),
        }
    }

    async fn delete_account(&self, id: &str) -> Result<(), CrmError> {
        let session = self.session().await?;
        info!(account_id = %id, "SF: delete Account");

        let response = self
            .http
            .delete(self.account_url(&session, Some(id)))
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::api_error("delete", response).await),
        }
    }

    async fn query_by_name_prefix(&self, prefix: &str) -> Result<Vec<CrmRecord>, CrmError> {
        let session = self.session().await?;
        let soql = format!(
            "SELECT Id, Name, BillingCountry, NumberOfEmployees, Phone FROM Account WHERE Name LIKE '{}%'",
            escape_soql(prefix)
        );

        let response = self
            .http
            .get(format!("{}/query", self.api_base(&session)))
            .bearer_auth(&session.access_token)
            .query(&[("q", soql.as_str())])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::api_error("query", response).await);
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(format!("query response: {e}")))?;
        Ok(result.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_soql_quotes() {
        assert_eq!(escape_soql("O'Brien"), "O\\'Brien");
        assert_eq!(escape_soql("a\\b"), "a\\\\b");
        assert_eq!(escape_soql("AutoAcct-run"), "AutoAcct-run");
    }

    #[tokio::test]
    async fn test_calls_before_authenticate_fail() {
        let client = SalesforceClient::new(
            "http://localhost:1",
            "id",
            "secret",
            "v60.0",
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client.delete_account("001").await.unwrap_err();
        assert!(matches!(err, CrmError::NotAuthenticated));
        assert!(err.is_auth());
    }
}
