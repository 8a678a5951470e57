// ABOUTME: OAuth 2.0 persistence models re-exported from grantd-core
// ABOUTME: Clients, authorization codes, token pairs, consents and scope sets

pub use grantd_core::models::*;
