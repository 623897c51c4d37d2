//! Azure Active Directory token acquisition
//!
//! Either a static bearer token supplied by the user or the OAuth2 client
//! credentials flow against `{authority}/{tenant}/oauth2/v2.0/token`.

use super::error::{ApiError, ErrorEnvelope};
use serde::{Deserialize, Deserializer};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Cloud endpoints for an Azure environment
#[derive(Debug, Clone, PartialEq)]
pub struct CloudEnvironment {
    pub name: &'static str,
    pub resource_manager: String,
    pub authority: String,
}

impl CloudEnvironment {
    pub fn from_name(name: &str) -> Option<Self> {
        let (name, resource_manager, authority) = match name.to_ascii_lowercase().as_str() {
            "" | "public" => (
                "public",
                "https://management.azure.com",
                "https://login.microsoftonline.com",
            ),
            "usgovernment" => (
                "usgovernment",
                "https://management.usgovcloudapi.net",
                "https://login.microsoftonline.us",
            ),
            "china" => (
                "china",
                "https://management.chinacloudapi.cn",
                "https://login.chinacloudapi.cn",
            ),
            _ => return None,
        };
        Some(Self {
            name,
            resource_manager: resource_manager.to_string(),
            authority: authority.to_string(),
        })
    }

    /// Replaces the resource manager endpoint; a bare host gets https
    pub fn with_resource_manager(mut self, endpoint: &str) -> Self {
        let endpoint = endpoint.trim_end_matches('/');
        self.resource_manager = if endpoint.starts_with("http://") || endpoint.starts_with("https://")
        {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        };
        self
    }

    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource_manager)
    }
}

pub enum Credential {
    /// Pre-acquired bearer token, never refreshed
    Static(String),
    ClientSecret(ClientSecretCredential),
}

impl Credential {
    pub async fn token(&self) -> Result<String, ApiError> {
        match self {
            Credential::Static(token) => Ok(token.clone()),
            Credential::ClientSecret(credential) => credential.token().await,
        }
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct ClientSecretCredential {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(deserialize_with = "seconds_from_number_or_string")]
    expires_in: u64,
}

// v1 endpoints return expires_in as a string
fn seconds_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Self {
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Requesting access token from {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let description = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error_description"].as_str().map(str::to_string))
                .unwrap_or_else(|| ErrorEnvelope::parse(&body).error.message);
            return Err(ApiError::AuthError(format!(
                "token request returned {}: {}",
                status, description
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::ParseError(format!("token response: {}", e)))?;

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn environments_resolve_by_name() {
        let public = CloudEnvironment::from_name("public").unwrap();
        assert_eq!(public.resource_manager, "https://management.azure.com");
        assert_eq!(public.scope(), "https://management.azure.com/.default");

        let china = CloudEnvironment::from_name("China").unwrap();
        assert_eq!(china.authority, "https://login.chinacloudapi.cn");

        assert!(CloudEnvironment::from_name("mars").is_none());
    }

    #[test]
    fn static_credential_returns_token() {
        let credential = Credential::Static("abc".to_string());
        assert_eq!(tokio_test::block_on(credential.token()).unwrap(), "abc");
    }

    #[test]
    fn resource_manager_override_adds_scheme() {
        let env = CloudEnvironment::from_name("public")
            .unwrap()
            .with_resource_manager("arm.contoso.local/");
        assert_eq!(env.resource_manager, "https://arm.contoso.local");

        let env = CloudEnvironment::from_name("public")
            .unwrap()
            .with_resource_manager("http://127.0.0.1:8080");
        assert_eq!(env.resource_manager, "http://127.0.0.1:8080");
    }

    #[tokio::test]
    async fn client_secret_tokens_are_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "app".into()),
                Matcher::UrlEncoded("scope".into(), "https://management.azure.com/.default".into()),
            ]))
            .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok-1"}"#)
            .expect(1)
            .create_async()
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &server.url(),
            "tenant-1",
            "app",
            "secret",
            "https://management.azure.com/.default",
        );

        assert_eq!(credential.token().await.unwrap(), "tok-1");
        assert_eq!(credential.token().await.unwrap(), "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expiring_tokens_are_refreshed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_body(r#"{"expires_in":"60","access_token":"short"}"#)
            .expect(2)
            .create_async()
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &server.url(),
            "tenant-1",
            "app",
            "secret",
            "scope",
        );

        credential.token().await.unwrap();
        credential.token().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_errors_surface_description() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret"}"#)
            .create_async()
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            &server.url(),
            "tenant-1",
            "app",
            "wrong",
            "scope",
        );

        match credential.token().await {
            Err(ApiError::AuthError(message)) => assert!(message.contains("AADSTS7000215")),
            other => panic!("expected AuthError, got {:?}", other.map(|_| ())),
        }
    }
}
