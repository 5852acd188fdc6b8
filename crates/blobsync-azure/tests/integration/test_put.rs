//! Integration tests for block-blob uploads
//!
//! Verifies the Put Blob request shape (path, headers, body) and error
//! handling against a wiremock-based Blob service mock.

use blobsync_azure::provider::AzureObjectStore;
use blobsync_core::domain::upload_target::RemotePrefix;
use blobsync_core::ports::object_store::{IObjectStore, ObjectReader};
use wiremock::{
    matchers::{body_bytes, header, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common;

fn reader_for(content: &'static [u8]) -> ObjectReader {
    Box::new(std::io::Cursor::new(content))
}

#[tokio::test]
async fn test_put_sends_block_blob_with_content() {
    let (server, client) = common::setup_blob_mock().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{}/dev1/A/x.txt", common::CONTAINER)))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .and(header("x-ms-version", blobsync_azure::client::STORAGE_API_VERSION))
        .and(header("content-length", "5"))
        .and(query_param("sig", "test-signature"))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client
        .put_block_blob("dev1/A/x.txt", reader_for(b"hello"), 5)
        .await
        .expect("Upload failed");
}

#[tokio::test]
async fn test_store_put_uses_prefix_and_file_name() {
    let (server, client) = common::setup_blob_mock().await;
    common::mount_put(&server, "dev1/sharedfiles/report.csv", 201).await;

    let store = AzureObjectStore::new(client);
    let prefix = RemotePrefix::for_directory("dev1", "/data/sharedfiles");

    store
        .put(&prefix, "report.csv", reader_for(b"a,b\n"), 4)
        .await
        .expect("Upload failed");

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, b"a,b\n");
}

#[tokio::test]
async fn test_put_encodes_spaces_in_file_name() {
    let (server, client) = common::setup_blob_mock().await;
    common::mount_put(&server, "dev1/A/my%20file.txt", 201).await;

    client
        .put_block_blob("dev1/A/my file.txt", reader_for(b"x"), 1)
        .await
        .expect("Upload failed");
}

#[tokio::test]
async fn test_put_server_error_is_reported() {
    let (server, client) = common::setup_blob_mock().await;
    common::mount_put(&server, "dev1/A/x.txt", 500).await;

    let result = client
        .put_block_blob("dev1/A/x.txt", reader_for(b"hello"), 5)
        .await;

    assert!(result.is_err());
    let chain = format!("{:#}", result.unwrap_err());
    assert!(chain.contains("Server error"), "unexpected error: {chain}");
}
