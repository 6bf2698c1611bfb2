//! VetDesk HTTP client
//!
//! An authenticated gateway over the VetDesk REST API: bearer-token attachment,
//! transparent single-flight token refresh on 401, session lifecycle events,
//! response envelope normalization and generic collection access.

#[macro_use]
extern crate tracing;

pub mod client;

pub use client::{
    ApiClient, ApiClientBuilder, AuthEndpoints, ClientConfig, ClientError, Envelope, Page,
    QueryParams, RefreshError, Resource, SessionEvent, SessionEvents,
};
pub use vetdesk_core as core;
