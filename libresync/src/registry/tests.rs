use super::*;
use crate::client::ClientConfig;
use std::time::Duration;

const DIGEST: &str = "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";

fn registry_client(server: &mockito::Server) -> RegistryClient {
    let config = ClientConfig::new()
        .with_retry_backoff(Duration::from_millis(1))
        .with_insecure_registry(server.host_with_port());
    RegistryClient::new(Client::with_config(config).unwrap())
}

fn identity(server: &mockito::Server) -> ImageIdentity {
    ImageIdentity::parse(&format!("{}/proj/app:v2", server.host_with_port())).unwrap()
}

#[test]
fn test_media_types_preference_order() {
    assert_eq!(MANIFEST_MEDIA_TYPES[0], "application/vnd.oci.image.index.v1+json");
    assert_eq!(MANIFEST_MEDIA_TYPES[1], "application/vnd.oci.image.manifest.v1+json");
    assert_eq!(
        MANIFEST_MEDIA_TYPES[5],
        "application/vnd.docker.distribution.manifest.list.v2+json"
    );
}

#[tokio::test]
async fn test_remote_digest_returns_repo_digest() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/proj/app/manifests/v2")
        .match_header("authorization", "Bearer secret-token")
        .match_header("accept", MANIFEST_MEDIA_TYPES.join(", ").as_str())
        .with_status(200)
        .with_header("docker-content-digest", DIGEST)
        .with_body("{}")
        .create_async()
        .await;

    let image = identity(&server);
    let digest = registry_client(&server)
        .remote_digest(&image, "secret-token")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(digest, format!("{}/proj/app@{}", server.host_with_port(), DIGEST));
}

#[tokio::test]
async fn test_remote_digest_missing_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/proj/app/manifests/v2")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let result = registry_client(&server)
        .remote_digest(&identity(&server), "token")
        .await;

    mock.assert_async().await;
    assert!(matches!(result.unwrap_err(), ResyncError::DigestFetch { .. }));
}

#[tokio::test]
async fn test_remote_digest_malformed_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/proj/app/manifests/v2")
        .with_status(200)
        .with_header("docker-content-digest", "not-a-digest")
        .create_async()
        .await;

    let result = registry_client(&server)
        .remote_digest(&identity(&server), "token")
        .await;

    mock.assert_async().await;
    assert!(matches!(result.unwrap_err(), ResyncError::DigestFetch { .. }));
}

#[tokio::test]
async fn test_remote_digest_unknown_manifest() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/proj/app/manifests/v2")
        .with_status(404)
        .create_async()
        .await;

    let result = registry_client(&server)
        .remote_digest(&identity(&server), "token")
        .await;

    mock.assert_async().await;
    assert!(matches!(
        result.unwrap_err(),
        ResyncError::DigestFetch {
            status_code: Some(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_authenticated_registry_runs_full_flow() {
    use crate::auth::{AuthClient, CredentialResolver};

    let mut server = mockito::Server::new_async().await;
    let challenge = format!(r#"Bearer realm="{}/token",service="test-registry""#, server.url());
    let discovery = server
        .mock("GET", "/v2/")
        .with_status(401)
        .with_header("www-authenticate", &challenge)
        .create_async()
        .await;
    let token = server
        .mock("GET", "/token")
        .match_query(mockito::Matcher::UrlEncoded(
            "scope".into(),
            "repository:proj/app:pull".into(),
        ))
        .with_status(200)
        .with_body(r#"{"token":"scoped"}"#)
        .create_async()
        .await;
    let manifest = server
        .mock("GET", "/v2/proj/app/manifests/v2")
        .match_header("authorization", "Bearer scoped")
        .with_status(200)
        .with_header("docker-content-digest", DIGEST)
        .create_async()
        .await;

    let config = ClientConfig::new()
        .with_retry_backoff(Duration::from_millis(1))
        .with_insecure_registry(server.host_with_port());
    let client = Client::with_config(config).unwrap();
    let source = AuthenticatedRegistry::new(
        AuthClient::new(client.clone(), CredentialResolver::anonymous()),
        RegistryClient::new(client),
    );

    let digest = source.remote_digest(&identity(&server)).await.unwrap();

    discovery.assert_async().await;
    token.assert_async().await;
    manifest.assert_async().await;
    assert!(digest.ends_with(DIGEST));
}
