//! Profile registry
//!
//! Owns every profile found in the profile directory and answers queries
//! over any subset of them, addressed by index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bw_core::cosmetic::CosmeticMap;
use bw_core::ruleset::PageSelectors;
use bw_core::types::Request;
use bw_core::url::{extract_host, is_http_scheme};
use chrono::Utc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::RegistryConfig;
use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::error::{RegistryError, UpdateError};
use crate::profile::{FilterProfile, ProfileInfo};
use crate::updater::{RefreshOutcome, UpdateFetcher};

const LIST_EXTENSION: &str = "txt";

/// Registry of filter profiles.
pub struct BlockingRegistry {
    config: RegistryConfig,
    sink: Arc<dyn DiagnosticSink>,
    profiles: Vec<Arc<FilterProfile>>,
    loaded: bool,
}

impl BlockingRegistry {
    /// Registry reporting diagnostics through `log`.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_sink(config, Arc::new(LogSink))
    }

    pub fn with_sink(config: RegistryConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            sink,
            profiles: Vec::new(),
            loaded: false,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// Discover the profiles in the profile directory.
    ///
    /// Bundled lists missing from the directory are copied in first. Profiles
    /// are ordered by file name and keep their index for the registry's
    /// lifetime. Calling this again does nothing.
    ///
    /// With `auto_update` set and a tokio runtime running, stale profiles
    /// are refreshed in the background.
    pub fn load_profiles(&mut self) -> Result<usize, RegistryError> {
        if self.loaded {
            return Ok(self.profiles.len());
        }

        let dir = self.config.profile_dir.clone();
        fs::create_dir_all(&dir).map_err(|source| RegistryError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        if let Some(bundled) = self.config.bundled_dir.clone() {
            install_bundled(&bundled, &dir);
        }

        for path in list_files(&dir)? {
            let profile = FilterProfile::open(&path, self.config.default_expiry_days, Arc::clone(&self.sink));
            log::debug!("Found profile '{}' at '{}'", profile.name(), path.display());
            self.profiles.push(Arc::new(profile));
        }
        self.loaded = true;
        log::info!("Loaded {} profiles from '{}'", self.profiles.len(), dir.display());

        if self.config.auto_update {
            self.schedule_updates();
        }

        Ok(self.profiles.len())
    }

    fn schedule_updates(&self) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::debug!("No async runtime, skipping automatic updates");
                return;
            }
        };

        match UpdateFetcher::http(&self.config) {
            Ok(fetcher) => {
                self.spawn_updates(&handle, Arc::new(fetcher));
            }
            Err(e) => log::warn!("Automatic updates disabled: {}", e),
        }
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profile(&self, index: usize) -> Option<&Arc<FilterProfile>> {
        self.profiles.get(index)
    }

    /// Metadata of every profile, in index order.
    pub fn profiles(&self) -> Vec<ProfileInfo> {
        self.profiles.iter().map(|profile| profile.info()).collect()
    }

    /// Indices of the named profiles. Unknown names are skipped.
    pub fn profile_indices<S: AsRef<str>>(&self, names: &[S]) -> Vec<usize> {
        names
            .iter()
            .filter_map(|name| {
                let found = self
                    .profiles
                    .iter()
                    .position(|profile| profile.name() == name.as_ref());
                if found.is_none() {
                    log::debug!("Unknown profile '{}'", name.as_ref());
                }
                found
            })
            .collect()
    }

    /// Selected profiles; out-of-range indices are skipped.
    fn selected<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a Arc<FilterProfile>> + 'a {
        indices.iter().filter_map(move |&index| self.profiles.get(index))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether any selected profile blocks the request.
    ///
    /// Only http and https requests are ever blocked.
    pub fn is_url_blocked(&self, indices: &[usize], request: &Request<'_>, base_url: &str) -> bool {
        if indices.is_empty() || !is_http_scheme(request.url) {
            return false;
        }
        self.selected(indices)
            .any(|profile| profile.is_blocked(request, base_url))
    }

    /// Generic hiding style sheet of the selected profiles.
    pub fn style_sheet(&self, indices: &[usize]) -> String {
        self.selected(indices)
            .map(|profile| profile.style_sheet())
            .filter(|sheet| !sheet.is_empty())
            .collect()
    }

    /// Merged domain → selector hiding map.
    pub fn hide_map(&self, indices: &[usize]) -> CosmeticMap {
        let mut merged = CosmeticMap::new();
        for profile in self.selected(indices) {
            merged.merge(&profile.hide_map());
        }
        merged
    }

    /// Merged domain → selector unhiding map.
    pub fn unhide_map(&self, indices: &[usize]) -> CosmeticMap {
        let mut merged = CosmeticMap::new();
        for profile in self.selected(indices) {
            merged.merge(&profile.unhide_map());
        }
        merged
    }

    /// Domain-specific selectors for a page, given as URL or bare host.
    pub fn page_selectors(&self, indices: &[usize], page: &str) -> PageSelectors {
        let host = extract_host(page).unwrap_or(page);
        let mut selectors = PageSelectors::default();
        for profile in self.selected(indices) {
            selectors.extend(profile.page_selectors(host));
        }
        selectors
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Indices of profiles due for a download.
    pub fn stale_profiles(&self) -> Vec<usize> {
        let now = Utc::now();
        self.profiles
            .iter()
            .enumerate()
            .filter(|(_, profile)| profile.needs_update(now))
            .map(|(index, _)| index)
            .collect()
    }

    /// Refresh the given profiles one after another.
    pub async fn refresh(
        &self,
        indices: &[usize],
        fetcher: &UpdateFetcher,
    ) -> Vec<(usize, Result<RefreshOutcome, UpdateError>)> {
        let mut results = Vec::with_capacity(indices.len());
        for &index in indices {
            if let Some(profile) = self.profiles.get(index) {
                results.push((index, fetcher.refresh(profile).await));
            }
        }
        results
    }

    /// Refresh every stale profile.
    pub async fn refresh_stale(&self, fetcher: &UpdateFetcher) -> Vec<(usize, Result<RefreshOutcome, UpdateError>)> {
        let stale = self.stale_profiles();
        self.refresh(&stale, fetcher).await
    }

    /// Refresh every stale profile on `handle`, one task per profile.
    pub fn spawn_updates(&self, handle: &Handle, fetcher: Arc<UpdateFetcher>) -> Vec<JoinHandle<()>> {
        self.stale_profiles()
            .into_iter()
            .map(|index| {
                let profile = Arc::clone(&self.profiles[index]);
                let fetcher = Arc::clone(&fetcher);
                handle.spawn(async move {
                    // Failures are already reported to the sink.
                    let _ = fetcher.refresh(&profile).await;
                })
            })
            .collect()
    }
}

/// Copy bundled lists that are not in `dir` yet.
fn install_bundled(bundled: &Path, dir: &Path) {
    let sources = match list_files(bundled) {
        Ok(sources) => sources,
        Err(e) => {
            log::warn!("Skipping bundled lists: {}", e);
            return;
        }
    };

    for source in sources {
        let file_name = match source.file_name() {
            Some(file_name) => file_name,
            None => continue,
        };
        let target = dir.join(file_name);
        if target.exists() {
            continue;
        }

        match fs::copy(&source, &target) {
            Ok(_) => {
                set_list_permissions(&target);
                log::info!("Installed bundled list '{}'", target.display());
            }
            Err(e) => log::warn!("Failed to copy '{}': {}", source.display(), e),
        }
    }
}

#[cfg(unix)]
fn set_list_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
        log::warn!("Failed to set permissions on '{}': {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn set_list_permissions(_path: &Path) {}

/// List files in `dir`, sorted by file name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let read_dir_error = |source| RegistryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == LIST_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
