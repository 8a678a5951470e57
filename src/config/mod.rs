// ABOUTME: Configuration module for the grantd authorization server
// ABOUTME: Environment-driven settings for the credential store and token lifetimes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! - **Environment**: deployment mode and the top-level [`ServerConfig`]
//! - **Database**: credential store location and pool size
//! - **OAuth2**: access token and authorization code lifetimes, reserved user

/// Credential store configuration
pub mod database;
/// Environment and server configuration
pub mod environment;
/// Authorization server lifetimes and policy
pub mod oauth2;

pub use database::{DatabaseConfig, DatabaseUrl};
pub use environment::{Environment, ServerConfig};
pub use oauth2::OAuth2ServerConfig;
