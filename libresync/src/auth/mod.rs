//! Registry bearer-token authentication.
//!
//! Pulling from a registry is a two-step flow. An unauthenticated request to
//! `/v2/` answers with a `WWW-Authenticate` challenge naming the token realm
//! and service; the realm then exchanges the service, a pull scope and
//! optionally Basic credentials for a short-lived bearer token.

use crate::client::Client;
use crate::error::{Result, ResyncError};
use crate::memo::SingleFlight;
use crate::reference::ImageIdentity;
use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

mod resolver;
mod store;

pub use resolver::CredentialResolver;
pub use store::{
    DockerAuthEntry, DockerConfig, KeychainStore, SecureStore, StaticCredentials, UnsupportedSecureStore,
    platform_secure_store,
};


/// Basic-auth credential for a registry token service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    account: String,
    encoded: String,
}

impl Credential {
    /// Creates a credential from an account and password.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::auth::Credential;
    ///
    /// let cred = Credential::basic("user", "pass");
    /// assert_eq!(cred.account(), "user");
    /// assert_eq!(cred.to_header_value(), "Basic dXNlcjpwYXNz");
    /// ```
    pub fn basic(account: impl Into<String>, password: impl AsRef<str>) -> Self {
        let account = account.into();
        let encoded =
            general_purpose::STANDARD.encode(format!("{}:{}", account, password.as_ref()));
        Self { account, encoded }
    }

    /// Creates a credential from a base64 `account:password` value.
    ///
    /// The account is the text before the first `:` of the decoded value.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::auth::Credential;
    ///
    /// let cred = Credential::from_encoded("dXNlcjpwYXNz").unwrap();
    /// assert_eq!(cred.account(), "user");
    /// ```
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let decoded = general_purpose::STANDARD.decode(encoded).map_err(|e| {
            ResyncError::config_with_source("Failed to decode registry credential", None, e)
        })?;
        let decoded = String::from_utf8_lossy(&decoded);
        let account = decoded
            .split_once(':')
            .map_or(decoded.as_ref(), |(account, _)| account)
            .to_string();

        Ok(Self {
            account,
            encoded: encoded.to_string(),
        })
    }

    /// Returns the account name sent as the `account` query parameter.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns the base64 `account:password` value.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Returns the `Authorization` header value.
    pub fn to_header_value(&self) -> String {
        format!("Basic {}", self.encoded)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("encoded", &"<redacted>")
            .finish()
    }
}

/// Token endpoint advertised by a registry's `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoint {
    /// URL of the token service
    pub realm: String,
    /// Service name to request tokens for
    pub service: String,
}

impl AuthEndpoint {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Example header: `Bearer realm="https://auth.docker.io/token",service="registry.docker.io"`
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::auth::AuthEndpoint;
    ///
    /// let header = r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io""#;
    /// let endpoint = AuthEndpoint::parse("registry-1.docker.io", header).unwrap();
    /// assert_eq!(endpoint.realm, "https://auth.docker.io/token");
    /// assert_eq!(endpoint.service, "registry.docker.io");
    /// ```
    pub fn parse(registry: &str, header: &str) -> Result<Self> {
        let params = header
            .trim()
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                ResyncError::auth_discovery(registry, format!("not a Bearer challenge: {}", header))
            })?
            .replace('"', "");

        let mut realm = None;
        let mut service = None;
        for field in params.split(',') {
            if let Some((key, value)) = field.split_once('=') {
                match key.trim() {
                    "realm" => realm = Some(value.trim().to_string()),
                    "service" => service = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        let realm = realm.ok_or_else(|| {
            ResyncError::auth_discovery(registry, "WWW-Authenticate header missing 'realm'")
        })?;
        let service = service.ok_or_else(|| {
            ResyncError::auth_discovery(registry, "WWW-Authenticate header missing 'service'")
        })?;

        url::Url::parse(&realm).map_err(|e| {
            ResyncError::auth_discovery(registry, format!("invalid realm '{}': {}", realm, e))
        })?;

        Ok(Self { realm, service })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Discovers token endpoints and exchanges them for scoped pull tokens.
///
/// Endpoint discovery is memoized per registry host for the lifetime of the
/// client; concurrent discoveries of the same host share one request.
#[derive(Debug)]
pub struct AuthClient {
    client: Client,
    credentials: CredentialResolver,
    endpoints: SingleFlight<AuthEndpoint>,
}

impl AuthClient {
    /// Creates an auth client using `credentials` for token requests.
    pub fn new(client: Client, credentials: CredentialResolver) -> Self {
        Self {
            client,
            credentials,
            endpoints: SingleFlight::new(),
        }
    }

    /// Returns the credential resolver.
    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// Returns the token endpoint for a registry host, discovering it once.
    pub async fn discover_endpoint(&self, registry: &str) -> Result<AuthEndpoint> {
        self.endpoints
            .get_or_try_init(registry, || self.fetch_endpoint(registry))
            .await
    }

    async fn fetch_endpoint(&self, registry: &str) -> Result<AuthEndpoint> {
        let url = format!("{}/v2/", self.client.registry_url(registry));
        debug!(%registry, %url, "discovering auth endpoint");

        let response = self.client.send(&url, |http| http.get(&url)).await?;
        let header = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .ok_or_else(|| {
                ResyncError::auth_discovery(registry, "response has no WWW-Authenticate header")
            })?
            .to_str()
            .map_err(|e| {
                ResyncError::auth_discovery(registry, format!("unreadable WWW-Authenticate: {}", e))
            })?;

        AuthEndpoint::parse(registry, header)
    }

    /// Exchanges an endpoint for a pull token scoped to `identity`.
    pub async fn fetch_token(&self, endpoint: &AuthEndpoint, identity: &ImageIdentity) -> Result<String> {
        let reference = identity.to_string();
        let scope = format!("repository:{}:pull", identity.remote_path());
        let credential = self.credentials.resolve(&endpoint.service).await;

        let mut query = vec![("service", endpoint.service.as_str()), ("scope", scope.as_str())];
        if let Some(credential) = &credential {
            query.push(("account", credential.account()));
        }

        debug!(%reference, realm = %endpoint.realm, authenticated = credential.is_some(), "fetching token");
        let response = self
            .client
            .send(&endpoint.realm, |http| {
                let request = http.get(&endpoint.realm).query(&query);
                match &credential {
                    Some(credential) => request.header(
                        reqwest::header::AUTHORIZATION,
                        credential.to_header_value(),
                    ),
                    None => request,
                }
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResyncError::token_fetch(
                reference,
                format!("token service answered HTTP {}", status.as_u16()),
                Some(status.as_u16()),
            ));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            ResyncError::token_fetch(
                &reference,
                format!("unparsable token response: {}", e),
                Some(status.as_u16()),
            )
        })?;

        body.token
            .or(body.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ResyncError::token_fetch(reference, "response has no token field", Some(status.as_u16()))
            })
    }

    /// Discovers the endpoint for `identity`'s registry and fetches a pull token.
    pub async fn pull_token(&self, identity: &ImageIdentity) -> Result<String> {
        let endpoint = self.discover_endpoint(identity.registry()).await?;
        self.fetch_token(&endpoint, identity).await
    }
}
