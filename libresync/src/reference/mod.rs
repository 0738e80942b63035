//! Image reference parsing.
//!
//! References follow the restricted grammar `[[registry/]repository/]name[:tag]`.
//! Missing parts fall back to Docker Hub conventions: registry
//! `registry-1.docker.io`, repository `library` and tag `latest`.

use crate::error::{Result, ResyncError};
use std::fmt;
use std::str::FromStr;


/// Registry host used when a reference does not name one.
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

/// Repository used when a reference does not name one.
pub const DEFAULT_REPOSITORY: &str = "library";

/// Tag used when a reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// Canonical identity of a locally cached image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageIdentity {
    registry: String,
    repository: String,
    name: String,
    tag: String,
}

impl ImageIdentity {
    /// Builds an identity from its parts.
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Parses a reference slug.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::reference::ImageIdentity;
    ///
    /// let id = ImageIdentity::parse("gcr.io/proj/app:v2").unwrap();
    /// assert_eq!(id.registry(), "gcr.io");
    /// assert_eq!(id.repository(), "proj");
    /// assert_eq!(id.name(), "app");
    /// assert_eq!(id.tag(), "v2");
    /// assert_eq!(id.full_reference(), "gcr.io/proj/app");
    /// ```
    pub fn parse(slug: &str) -> Result<Self> {
        let trimmed = slug.trim();
        if trimmed.is_empty() {
            return Err(ResyncError::malformed_reference(slug, "reference is empty"));
        }
        if trimmed.contains('@') {
            return Err(ResyncError::malformed_reference(
                slug,
                "digest-pinned references cannot be synchronized",
            ));
        }

        // A ':' after the last '/' starts the tag; earlier ones belong to a registry port.
        let last_slash = trimmed.rfind('/').map_or(0, |i| i + 1);
        let (path, tag) = match trimmed[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&trimmed[..split], Some(&trimmed[split + 1..]))
            }
            None => (trimmed, None),
        };

        let tag = match tag {
            Some("") => return Err(ResyncError::malformed_reference(slug, "tag is empty")),
            Some(tag) => tag,
            None => DEFAULT_TAG,
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ResyncError::malformed_reference(slug, "empty path segment"));
        }

        let identity = match segments.as_slice() {
            [] => return Err(ResyncError::malformed_reference(slug, "no path segments")),
            [name] => Self::new(DEFAULT_REGISTRY, DEFAULT_REPOSITORY, *name, tag),
            [repository, name] => Self::new(DEFAULT_REGISTRY, *repository, *name, tag),
            [registry, middle @ .., name] => Self::new(*registry, middle.join("/"), *name, tag),
        };

        Ok(identity)
    }

    /// Returns the registry host (e.g. `registry-1.docker.io`).
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Returns the repository (namespace) part.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the image name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the registry base URL, always `https://<registry>`.
    pub fn registry_url(&self) -> String {
        format!("https://{}", self.registry)
    }

    /// Returns the repository path used in registry API URLs and token scopes.
    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.repository, self.name)
    }

    /// Returns the reference as the local image store names it, without a tag.
    ///
    /// Docker Hub images drop the registry, and official images also drop
    /// the `library` repository.
    pub fn full_reference(&self) -> String {
        if self.registry == DEFAULT_REGISTRY {
            if self.repository == DEFAULT_REPOSITORY {
                self.name.clone()
            } else {
                format!("{}/{}", self.repository, self.name)
            }
        } else {
            format!("{}/{}/{}", self.registry, self.repository, self.name)
        }
    }

    /// Returns a copy of this identity pointing at another tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..self.clone()
        }
    }
}

impl FromStr for ImageIdentity {
    type Err = ResyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.full_reference(), self.tag)
    }
}
