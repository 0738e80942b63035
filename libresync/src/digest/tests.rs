use super::*;
use std::str::FromStr;

const DIGEST: &str = "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";

#[test]
fn test_digest_from_valid_string_succeeds() {
    let digest = Digest::from_str(DIGEST);
    assert!(digest.is_ok());
}

#[test]
fn test_digest_from_invalid_string_fails() {
    let invalid_digest_str = "sha256:invalid-digest";
    let digest = Digest::from_str(invalid_digest_str);
    assert!(digest.is_err());
    assert!(matches!(
        digest.unwrap_err(),
        ResyncError::DigestFetch { .. }
    ));
}

#[test]
fn test_digest_display_trait() {
    let digest = Digest::from_str(DIGEST).unwrap();
    assert_eq!(digest.to_string(), DIGEST);
}

#[test]
fn test_repo_digest_prefixes_reference() {
    let digest = Digest::from_str(DIGEST).unwrap();
    assert_eq!(
        repo_digest("gcr.io/proj/app", &digest),
        format!("gcr.io/proj/app@{}", DIGEST)
    );
}

#[test]
fn test_compare_digests_equal() {
    assert!(compare_digests("sha256:abc", "sha256:abc"));
}

#[test]
fn test_compare_digests_empty_is_never_equal() {
    assert!(!compare_digests("", "sha256:abc"));
    assert!(!compare_digests("sha256:abc", ""));
    assert!(!compare_digests("", ""));
}

#[test]
fn test_compare_digests_different() {
    assert!(!compare_digests("sha256:abc", "sha256:abd"));
    assert!(!compare_digests("redis@sha256:abc", "sha256:abc"));
}
