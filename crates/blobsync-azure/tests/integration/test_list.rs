//! Integration tests for listing and existence checks
//!
//! Verifies List Blobs query construction, pagination, and exact-name
//! matching against a wiremock-based Blob service mock.

use blobsync_azure::provider::AzureObjectStore;
use blobsync_azure::AzureError;
use blobsync_core::domain::upload_target::RemotePrefix;
use blobsync_core::ports::object_store::IObjectStore;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common;

// ============================================================================
// Listing tests
// ============================================================================

#[tokio::test]
async fn test_list_blobs_returns_names() {
    let (server, client) = common::setup_blob_mock().await;
    common::mount_list_single_page(&server, "dev1/A/", &["dev1/A/x.txt", "dev1/A/y.txt"]).await;

    let blobs = client.list_blobs("dev1/A/").await.expect("List failed");

    let names: Vec<_> = blobs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["dev1/A/x.txt", "dev1/A/y.txt"]);
    assert_eq!(blobs[0].size, Some(5));
}

#[tokio::test]
async fn test_list_blobs_follows_next_marker() {
    let (server, client) = common::setup_blob_mock().await;
    let container_path = format!("/{}", common::CONTAINER);

    // Page 2 mounted first so it wins when the marker is present
    Mock::given(method("GET"))
        .and(path(container_path.as_str()))
        .and(query_param("marker", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::listing_xml(
            "dev1/A/",
            &["dev1/A/c.txt"],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(container_path.as_str()))
        .and(query_param("comp", "list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::listing_xml(
            "dev1/A/",
            &["dev1/A/a.txt", "dev1/A/b.txt"],
            Some("page2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let blobs = client.list_blobs("dev1/A/").await.expect("List failed");

    let names: Vec<_> = blobs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["dev1/A/a.txt", "dev1/A/b.txt", "dev1/A/c.txt"]);
}

#[tokio::test]
async fn test_list_blobs_forbidden_is_error() {
    let (server, client) = common::setup_blob_mock().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("AuthorizationPermissionMismatch"),
        )
        .mount(&server)
        .await;

    let result = client.list_blobs("dev1/A/").await;
    assert!(result.is_err());
    let chain = format!("{:#}", result.unwrap_err());
    assert!(chain.contains("Forbidden"), "unexpected error: {chain}");
}

#[tokio::test]
async fn test_list_blobs_unreachable_server_is_network_error() {
    let (server, client) = common::setup_blob_mock().await;
    drop(server);

    let err = client.list_blobs("dev1/A/").await.unwrap_err();

    assert!(
        err.chain().any(|cause| matches!(
            cause.downcast_ref::<AzureError>(),
            Some(AzureError::NetworkError(_))
        )),
        "unexpected error: {err:#}"
    );
}

// ============================================================================
// Existence tests
// ============================================================================

#[tokio::test]
async fn test_exists_matches_exact_name_only() {
    let (server, client) = common::setup_blob_mock().await;
    // A listing by prefix also returns names that merely start with the file name
    common::mount_list_single_page(&server, "dev1/A/", &["dev1/A/x.txt.bak", "dev1/A/y.txt"])
        .await;

    let store = AzureObjectStore::new(client);
    let prefix = RemotePrefix::for_directory("dev1", "/data/A");

    assert!(store.exists(&prefix, "y.txt").await.unwrap());
    assert!(!store.exists(&prefix, "x.txt").await.unwrap());
}

#[tokio::test]
async fn test_exists_in_empty_folder_is_false() {
    let (server, client) = common::setup_blob_mock().await;
    common::mount_list_single_page(&server, "dev1/B/", &[]).await;

    let store = AzureObjectStore::new(client);
    let prefix = RemotePrefix::for_directory("dev1", "/data/B");

    assert!(!store.exists(&prefix, "anything.txt").await.unwrap());
}
