//! Azure Blob Storage REST client
//!
//! Provides a typed HTTP client for a single container addressed by a SAS URL.
//! Handles SAS token propagation, blob URL construction, listing pagination,
//! and streaming block-blob uploads.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use blobsync_azure::client::BlobContainerClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = BlobContainerClient::from_sas_url(
//!     "https://acct.blob.core.windows.net/telemetry?sv=2019-12-12&sp=wl&sig=...",
//! )?;
//! for blob in client.list_blobs("rig-07/NetworkSurveyData/").await? {
//!     println!("{}", blob.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## REST API References
//!
//! - [List Blobs](https://learn.microsoft.com/en-us/rest/api/storageservices/list-blobs)
//! - [Put Blob](https://learn.microsoft.com/en-us/rest/api/storageservices/put-blob)

use anyhow::{Context, Result};
use blobsync_core::ports::object_store::{ObjectInfo, ObjectReader};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, Method, RequestBuilder, Response};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

use crate::sas::SasUrl;
use crate::AzureError;

/// Storage service REST version sent with every request
pub const STORAGE_API_VERSION: &str = "2020-10-02";

/// Maximum number of bytes of an error body kept in [`AzureError`]
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// BlobContainerClient
// ============================================================================

/// HTTP client for one blob container
///
/// Wraps `reqwest::Client` with SAS token handling and URL construction for
/// the Blob service REST API.
pub struct BlobContainerClient {
    /// The underlying HTTP client
    client: Client,
    /// Container URL and SAS token
    sas: SasUrl,
}

impl BlobContainerClient {
    /// Creates a new client for the container addressed by `sas`
    pub fn new(sas: SasUrl) -> Self {
        Self {
            client: Client::new(),
            sas,
        }
    }

    /// Parses `sas_url` and creates a client for it
    ///
    /// # Errors
    /// Returns an error if `sas_url` is not a valid container SAS URL
    pub fn from_sas_url(sas_url: &str) -> Result<Self> {
        let sas = SasUrl::parse(sas_url).context("Failed to parse SAS URL")?;
        Ok(Self::new(sas))
    }

    /// Creates a client with a custom container URL (useful for testing)
    ///
    /// # Arguments
    /// * `container_url` - Base URL including the container path
    /// * `token` - SAS token query string
    pub fn with_base_url(container_url: impl AsRef<str>, token: impl AsRef<str>) -> Result<Self> {
        let sas = SasUrl::from_parts(container_url.as_ref(), token.as_ref())
            .context("Failed to build container URL")?;
        Ok(Self::new(sas))
    }

    /// Name of the container this client addresses
    pub fn container_name(&self) -> &str {
        self.sas.container_name()
    }

    /// URL for a blob, with the SAS token attached
    ///
    /// Each `/`-separated part of `blob_name` becomes a percent-encoded path
    /// segment under the container.
    pub fn blob_url(&self, blob_name: &str) -> Result<Url> {
        let mut url = self.sas.container_url().clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Container URL cannot be a base"))?
            .pop_if_empty()
            .extend(blob_name.split('/'));
        url.set_query(Some(self.sas.token()));
        Ok(url)
    }

    /// URL for a container-level operation with extra query parameters
    fn container_url_with(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.sas.container_url().clone();
        url.set_query(Some(self.sas.token()));
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// Creates a request builder with the storage version header set
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, PUT, etc.)
    /// * `url` - Fully built URL including the SAS token
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("x-ms-version", STORAGE_API_VERSION)
    }

    /// Lists all blobs whose names start with `prefix`
    ///
    /// Follows `NextMarker` until the listing is exhausted.
    ///
    /// # Arguments
    /// * `prefix` - Name prefix without a leading `/` (e.g. `dev1/A/`)
    #[tracing::instrument(skip(self))]
    pub async fn list_blobs(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut params = vec![("restype", "container"), ("comp", "list"), ("prefix", prefix)];
            if let Some(m) = marker.as_deref() {
                params.push(("marker", m));
            }
            let url = self.container_url_with(&params);

            let response = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(AzureError::NetworkError)
                .context("Failed to send List Blobs request")?;
            let body = check_status(response)
                .await
                .context("List Blobs returned error status")?
                .text()
                .await
                .context("Failed to read List Blobs response")?;

            let page = parse_list_blobs(&body).context("Failed to parse List Blobs response")?;
            debug!(
                prefix,
                count = page.blobs.len(),
                has_more = page.next_marker.is_some(),
                "Listed blob page"
            );
            blobs.extend(page.blobs);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(blobs)
    }

    /// Checks whether a blob named exactly `prefix + file_name` exists
    ///
    /// Lists under `prefix` and compares names, so the SAS token needs the
    /// list permission but not read.
    ///
    /// # Arguments
    /// * `prefix` - Name prefix without a leading `/`
    /// * `file_name` - Bare file name
    pub async fn blob_exists(&self, prefix: &str, file_name: &str) -> Result<bool> {
        let wanted = format!("{prefix}{file_name}");
        let blobs = self.list_blobs(prefix).await?;
        Ok(blobs.iter().any(|blob| blob.name == wanted))
    }

    /// Uploads `length` bytes from `reader` as a block blob
    ///
    /// Makes a single `PUT <container>/<blob_name>` with
    /// `x-ms-blob-type: BlockBlob`; the body is streamed from `reader`.
    ///
    /// # Arguments
    /// * `blob_name` - Full blob name without a leading `/`
    /// * `reader` - Content source
    /// * `length` - Exact content length
    #[tracing::instrument(skip(self, reader))]
    pub async fn put_block_blob(
        &self,
        blob_name: &str,
        reader: ObjectReader,
        length: u64,
    ) -> Result<()> {
        let url = self.blob_url(blob_name)?;
        let body = Body::wrap_stream(ReaderStream::new(reader));

        let response = self
            .request(Method::PUT, url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .map_err(AzureError::NetworkError)
            .context("Failed to send Put Blob request")?;
        check_status(response)
            .await
            .with_context(|| format!("Put Blob returned error status for {blob_name}"))?;

        info!(blob = blob_name, bytes = length, "Uploaded blob");
        Ok(())
    }
}

/// Passes successful responses through; maps others to [`AzureError`]
async fn check_status(response: Response) -> Result<Response, AzureError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(AzureError::from_status(status, body))
}

// ============================================================================
// List Blobs XML parsing
// ============================================================================

/// One page of a List Blobs response
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ListBlobsPage {
    pub blobs: Vec<ObjectInfo>,
    pub next_marker: Option<String>,
}

/// Parses an `EnumerationResults` document
///
/// Only `Blob/Name`, `Blob/Properties/Content-Length`, and the top-level
/// `NextMarker` are read; everything else is ignored.
pub(crate) fn parse_list_blobs(xml: &str) -> Result<ListBlobsPage, AzureError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListBlobsPage::default();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<ObjectInfo> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"Blob" {
                    current = Some(ObjectInfo {
                        name: String::new(),
                        size: None,
                    });
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| AzureError::InvalidResponse(err.to_string()))?;
                match path_tail(&path).as_slice() {
                    [.., b"Blob", b"Name"] => {
                        if let Some(blob) = current.as_mut() {
                            blob.name.push_str(&text);
                        }
                    }
                    [.., b"Blob", b"Properties", b"Content-Length"] => {
                        if let Some(blob) = current.as_mut() {
                            blob.size = text.trim().parse().ok();
                        }
                    }
                    [b"EnumerationResults", b"NextMarker"] => {
                        if !text.is_empty() {
                            page.next_marker = Some(text.into_owned());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"Blob" {
                    if let Some(blob) = current.take() {
                        page.blobs.push(blob);
                    }
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AzureError::InvalidResponse(e.to_string())),
            _ => {}
        }
    }

    Ok(page)
}

fn path_tail(path: &[Vec<u8>]) -> Vec<&[u8]> {
    path.iter().map(Vec::as_slice).collect()
}
