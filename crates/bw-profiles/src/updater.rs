//! List updates
//!
//! Downloads a profile's list, validates it, stores it next to the other
//! profiles and hands it to the profile for a rebuild. Nothing about the
//! previous state changes unless the download validates.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bw_compiler::header::rewrite_list;
use bw_compiler::{parse_header, verify_checksum, ChecksumStatus};
use chrono::Utc;

use crate::config::RegistryConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCategory};
use crate::error::UpdateError;
use crate::profile::FilterProfile;

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Transport used to download lists.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, UpdateError>;
}

/// `Fetch` over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &RegistryConfig) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UpdateError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, UpdateError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpdateError::Transport(e.to_string()))?;
        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Result of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub checksum: ChecksumStatus,
    /// The list was written to disk; when false only memory was updated.
    pub persisted: bool,
}

/// Downloads and applies list updates.
#[derive(Clone)]
pub struct UpdateFetcher {
    fetch: Arc<dyn Fetch>,
}

impl UpdateFetcher {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    /// Fetcher using HTTP with the configured user agent and timeout.
    pub fn http(config: &RegistryConfig) -> Result<Self, UpdateError> {
        Ok(Self::new(Arc::new(HttpFetcher::new(config)?)))
    }

    /// Download the profile's list and rebuild it.
    ///
    /// Failures are reported to the profile's diagnostics sink and leave the
    /// profile as it was. A refresh started later on the same profile makes
    /// this one end with `UpdateError::Superseded`.
    pub async fn refresh(&self, profile: &Arc<FilterProfile>) -> Result<RefreshOutcome, UpdateError> {
        let name = profile.name();
        let url = profile
            .update_url()
            .ok_or_else(|| UpdateError::NoUpdateUrl(name.clone()))?;
        let ticket = profile.begin_update();

        log::info!("Updating '{}' from {}", name, url);
        let result = self.download(&url).await;

        if !profile.is_current_update(ticket) {
            log::debug!("Dropping stale update of '{}'", name);
            return Err(UpdateError::Superseded);
        }

        let (text, checksum) = match result {
            Ok(validated) => validated,
            Err(e) => {
                let category = match e {
                    UpdateError::Checksum(_) => DiagnosticCategory::Checksum,
                    _ => DiagnosticCategory::Download,
                };
                profile.report(Diagnostic::error(
                    category,
                    format!("Failed to update '{}' from {}: {}", name, url, e),
                ));
                return Err(e);
            }
        };

        let text = rewrite_list(&text, &url, Utc::now());
        let persisted = commit(profile, ticket, text).await?;
        log::info!("Updated '{}' ({:?})", name, checksum);
        Ok(RefreshOutcome { checksum, persisted })
    }

    async fn download(&self, url: &str) -> Result<(String, ChecksumStatus), UpdateError> {
        let response = self.fetch.fetch(url).await?;
        if !(200..300).contains(&response.status) {
            return Err(UpdateError::HttpStatus(response.status));
        }

        let text = String::from_utf8_lossy(&response.body).into_owned();
        parse_header(&text)?;
        let checksum = verify_checksum(&text)?;
        Ok((text, checksum))
    }
}

/// Store a validated list and hand it to the profile.
///
/// Runs under the profile's persist lock so the last list written is the
/// last one applied. A stale ticket leaves disk and memory untouched. A
/// failed write is reported and memory is updated anyway; the returned flag
/// tells whether the list reached the disk.
async fn commit(profile: &Arc<FilterProfile>, ticket: u64, text: String) -> Result<bool, UpdateError> {
    let _guard = profile.persist_lock.lock().await;
    if !profile.is_current_update(ticket) {
        log::debug!("Dropping stale update of '{}'", profile.name());
        return Err(UpdateError::Superseded);
    }

    let path = profile.path();
    let persisted = match write_list(&path, &text).await {
        Ok(()) => true,
        Err(source) => {
            let e = UpdateError::Write { path, source };
            profile.report(Diagnostic::warn(DiagnosticCategory::Write, e.to_string()));
            false
        }
    };

    profile.apply_update(text);
    Ok(persisted)
}

/// Replace `path` with `text` through a temporary sibling file.
async fn write_list(path: &Path, text: &str) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");

    tokio::fs::write(&partial, text).await?;
    if let Err(e) = tokio::fs::rename(&partial, path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }
    Ok(())
}
