//! Integration tests for blobsync-azure
//!
//! Uses wiremock to simulate the Blob service REST API and verifies
//! end-to-end behavior of listing, existence checks, and uploads.

mod common;

mod test_list;
mod test_put;
