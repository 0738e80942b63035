//! Remote manifest digest lookup.
//!
//! The registry is asked for the manifest of a tag with a content-negotiated
//! `Accept` list; only the `Docker-Content-Digest` response header is used.
//! The manifest body itself is never parsed.

use crate::auth::AuthClient;
use crate::client::Client;
use crate::digest::{Digest, repo_digest};
use crate::error::{Result, ResyncError};
use crate::reference::ImageIdentity;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::str::FromStr;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Response header carrying the manifest digest.
pub const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Manifest media types in preference order.
pub const MANIFEST_MEDIA_TYPES: [&str; 6] = [
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.docker.distribution.manifest.v1+prettyjws",
    "application/json",
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
];

/// Source of the current remote digest of an image.
#[async_trait]
pub trait DigestSource: Send + Sync {
    /// Returns the remote digest as `<full reference>@<digest>`.
    async fn remote_digest(&self, image: &ImageIdentity) -> Result<String>;
}

/// Fetches manifest digests from remote registries.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
}

impl RegistryClient {
    /// Creates a registry client sharing `client`'s connection pool.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns the remote digest of `identity` as `<full reference>@<digest>`.
    ///
    /// The result has the same shape as a local `RepoDigests` entry so the
    /// two compare by plain string equality.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::DigestFetch`] when the registry answers without a
    /// success status, omits the digest header, or sends a malformed digest.
    pub async fn remote_digest(&self, identity: &ImageIdentity, token: &str) -> Result<String> {
        let reference = identity.to_string();
        let url = format!(
            "{}/v2/{}/manifests/{}",
            self.client.registry_url(identity.registry()),
            identity.remote_path(),
            identity.tag()
        );
        let accept = MANIFEST_MEDIA_TYPES.join(", ");
        debug!(%reference, %url, "fetching remote digest");

        let response = self
            .client
            .send(&url, |http| {
                http.get(&url)
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .header(ACCEPT, accept.as_str())
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResyncError::digest_fetch(
                reference,
                format!("manifest request answered HTTP {}", status.as_u16()),
                Some(status.as_u16()),
            ));
        }

        let header = response
            .headers()
            .get(CONTENT_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ResyncError::digest_fetch(
                    &reference,
                    format!("response has no {} header", CONTENT_DIGEST_HEADER),
                    Some(status.as_u16()),
                )
            })?;

        let digest = Digest::from_str(header).map_err(|_| {
            ResyncError::digest_fetch(
                &reference,
                format!("malformed digest '{}'", header),
                Some(status.as_u16()),
            )
        })?;

        Ok(repo_digest(&identity.full_reference(), &digest))
    }
}

/// [`DigestSource`] that authenticates against the registry before every
/// manifest lookup.
///
/// Endpoint discovery is memoized by the [`AuthClient`]; tokens are fetched
/// per image since their scope names the repository.
#[derive(Debug)]
pub struct AuthenticatedRegistry {
    auth: AuthClient,
    registry: RegistryClient,
}

impl AuthenticatedRegistry {
    pub fn new(auth: AuthClient, registry: RegistryClient) -> Self {
        Self { auth, registry }
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }
}

#[async_trait]
impl DigestSource for AuthenticatedRegistry {
    async fn remote_digest(&self, image: &ImageIdentity) -> Result<String> {
        let token = self.auth.pull_token(image).await?;
        self.registry.remote_digest(image, &token).await
    }
}
