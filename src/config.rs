//! Render configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// Fields whose resources may be fetched at the same time. Each field
    /// has at most one fetch in flight.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Refuse templates declaring a newer `engineMinVersion`
    #[serde(default = "default_true")]
    pub check_engine_version: bool,
}

fn default_max_concurrent_fetches() -> usize { 4 }
fn default_true() -> bool { true }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            check_engine_version: true,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    pub fn with_check_engine_version(mut self, check: bool) -> Self {
        self.check_engine_version = check;
        self
    }

    /// Concurrency actually used; zero would never make progress
    pub(crate) fn fetch_limit(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }
}
