//! Content digest validation and comparison.
//!
//! Remote digests come from the `Docker-Content-Digest` header and are
//! validated with `oci_spec`. Local digests are the `RepoDigests` entries the
//! image store reports, of the form `<full reference>@<digest>`.

use crate::error::{Result, ResyncError};
use oci_spec::image::Digest as OciDigest;
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// Represents a content digest, wrapping the `oci_spec::image::Digest` type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest(OciDigest);

impl FromStr for Digest {
    type Err = ResyncError;

    fn from_str(s: &str) -> Result<Self> {
        let oci_digest = OciDigest::from_str(s.trim()).map_err(|e| {
            ResyncError::digest_fetch(s, format!("invalid digest format: {}", e), None)
        })?;
        Ok(Digest(oci_digest))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Builds the repo digest string a local store reports for `full_reference`.
///
/// # Examples
///
/// ```
/// use libresync::digest::{Digest, repo_digest};
/// use std::str::FromStr;
///
/// let digest = Digest::from_str(
///     "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc",
/// ).unwrap();
/// assert_eq!(
///     repo_digest("redis", &digest),
///     "redis@sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc",
/// );
/// ```
pub fn repo_digest(full_reference: &str, digest: &Digest) -> String {
    format!("{}@{}", full_reference, digest)
}

/// Compares two digests for synchronization purposes.
///
/// An empty digest means the probe that produced it failed, so it never
/// counts as equal, not even to another empty digest.
///
/// # Examples
///
/// ```
/// use libresync::digest::compare_digests;
///
/// assert!(compare_digests("sha256:abc", "sha256:abc"));
/// assert!(!compare_digests("", "sha256:abc"));
/// assert!(!compare_digests("", ""));
/// ```
pub fn compare_digests(digest: &str, other: &str) -> bool {
    !digest.is_empty() && !other.is_empty() && digest == other
}
