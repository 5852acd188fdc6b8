//! blobsync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `UploadTarget`, `RemotePrefix`, `SyncResult`, `CredentialValidity`
//! - **Credential expiry** - restricted date parsing and validity messages for SAS URLs
//! - **Port definitions** - Traits for adapters: `IObjectStore`, `INetworkState`, `IStatusReporter`
//! - **Configuration** - YAML configuration plus the managed-settings overlay
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`blobsync-azure` for the object store, `blobsync-sync` for network state
//! and status persistence).

pub mod config;
pub mod domain;
pub mod ports;
