// ABOUTME: Unified error handling re-exported from grantd-core
// ABOUTME: AppError, ErrorCode and AppResult used by every store operation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use grantd_core::errors::*;
