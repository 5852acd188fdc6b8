//! Shared test helpers for Blob service integration tests
//!
//! Provides wiremock-based mock server setup for the List Blobs and Put Blob
//! endpoints. Each helper mounts the endpoints it needs; [`setup_blob_mock`]
//! returns a client pointing at the mock server.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blobsync_azure::client::BlobContainerClient;

/// Container name used by every mock
pub const CONTAINER: &str = "telemetry";

/// SAS token attached to every request
pub const TOKEN: &str = "sv=2019-12-12&sp=wl&sig=test-signature";

/// Starts a mock server and returns a (MockServer, BlobContainerClient) tuple
pub async fn setup_blob_mock() -> (MockServer, BlobContainerClient) {
    let server = MockServer::start().await;
    let client = BlobContainerClient::with_base_url(format!("{}/{CONTAINER}", server.uri()), TOKEN)
        .expect("mock container URL is valid");
    (server, client)
}

/// Builds an `EnumerationResults` body with the given blob names
pub fn listing_xml(prefix: &str, names: &[&str], next_marker: Option<&str>) -> String {
    let blobs: String = names
        .iter()
        .map(|name| {
            format!(
                "<Blob><Name>{name}</Name><Properties><Content-Length>5</Content-Length>\
                 <BlobType>BlockBlob</BlobType></Properties></Blob>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><EnumerationResults ContainerName="{CONTAINER}"><Prefix>{prefix}</Prefix><Blobs>{blobs}</Blobs><NextMarker>{}</NextMarker></EnumerationResults>"#,
        next_marker.unwrap_or_default()
    )
}

/// Mounts a List Blobs endpoint returning a single page
pub async fn mount_list_single_page(server: &MockServer, prefix: &str, names: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/{CONTAINER}")))
        .and(query_param("restype", "container"))
        .and(query_param("comp", "list"))
        .and(query_param("prefix", prefix))
        .and(query_param("sig", "test-signature"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_xml(prefix, names, None))
                .append_header("Content-Type", "application/xml"),
        )
        .mount(server)
        .await;
}

/// Mounts a Put Blob endpoint that accepts the given blob path
pub async fn mount_put(server: &MockServer, blob_path: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path(format!("/{CONTAINER}/{blob_path}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
