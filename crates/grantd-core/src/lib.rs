// ABOUTME: Core types for the grantd authorization server
// ABOUTME: Foundation crate with error handling and OAuth 2.0 persistence models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # grantd core
//!
//! Shared types for the grantd authorization server. This crate is designed to
//! change infrequently so the main crate gets incremental compilation benefits.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **models**: Persistence models for clients, authorization codes, tokens and consents

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// OAuth 2.0 persistence models
pub mod models;
