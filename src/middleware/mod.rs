// ABOUTME: HTTP middleware for the authorization server
// ABOUTME: Bearer token authentication gate that attaches the resolved principal to requests

/// Bearer token authentication gate
pub mod oauth2_gate;

pub use oauth2_gate::{oauth2_gate, ExtractedPrincipal};
