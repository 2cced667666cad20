// Shared test helpers for engine setup.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::sync::Arc;

use rest_engine::{CollectingWarningSink, CookieStore, HttpClient};
use tempfile::TempDir;

/// An engine whose cookie jar lives in its own temp directory and whose
/// warnings are collected for assertions.
pub struct TestEngine {
    pub client: HttpClient,
    pub warnings: Arc<CollectingWarningSink>,
    pub dir: TempDir,
}

#[allow(dead_code)] // Used by other test files
pub fn test_engine() -> TestEngine {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let cookies = CookieStore::new(dir.path().join("cookie.json"))
        .expect("Failed to create cookie store");
    let warnings = Arc::new(CollectingWarningSink::new());
    let client = HttpClient::new(Arc::new(cookies)).with_warning_sink(warnings.clone());
    TestEngine {
        client,
        warnings,
        dir,
    }
}
