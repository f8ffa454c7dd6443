//! Filter profile
//!
//! One filter list on disk. The header is read eagerly so metadata and
//! staleness are known right away; the rules are parsed on first use or on
//! a background thread. Rebuilds swap the whole rule set at once, so a
//! query sees either the old rules or the new ones.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwapOption;
use bw_compiler::header::{is_expired, ListHeader};
use bw_compiler::{build_rule_set, parse_header};
use bw_core::cosmetic::CosmeticMap;
use bw_core::matcher::Matcher;
use bw_core::ruleset::{PageSelectors, RuleSet};
use bw_core::types::Request;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink};
use crate::error::ProfileError;

/// Public metadata of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileInfo {
    /// File stem of the list, used as the profile's identifier.
    pub name: String,
    /// `! Title:` header, or the name when absent.
    pub title: String,
    pub path: PathBuf,
    pub update_url: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub expires_days: u32,
    /// The list has no rule lines yet.
    pub is_empty: bool,
    /// The list carries the format marker.
    pub is_valid: bool,
    pub is_loaded: bool,
    /// An update was applied during this session.
    pub is_up_to_date: bool,
}

impl ProfileInfo {
    fn from_header(name: String, path: PathBuf, header: &ListHeader, default_expiry_days: u32) -> Self {
        Self {
            title: header.title.clone().unwrap_or_else(|| name.clone()),
            name,
            path,
            update_url: header.update_url.clone(),
            last_update: header.last_modified,
            expires_days: header.expires_days.unwrap_or(default_expiry_days),
            is_empty: header.body_empty,
            is_valid: true,
            is_loaded: false,
            is_up_to_date: false,
        }
    }

    fn invalid(name: String, path: PathBuf, default_expiry_days: u32) -> Self {
        Self {
            title: name.clone(),
            name,
            path,
            update_url: None,
            last_update: None,
            expires_days: default_expiry_days,
            is_empty: true,
            is_valid: false,
            is_loaded: false,
            is_up_to_date: false,
        }
    }
}

/// A filter list with lazily built rules.
pub struct FilterProfile {
    info: RwLock<ProfileInfo>,
    rules: ArcSwapOption<RuleSet>,
    /// Serializes rule building against rule replacement.
    load_lock: Mutex<()>,
    /// Downloaded text to build from instead of the file.
    pending_text: Mutex<Option<String>>,
    update_ticket: AtomicU64,
    /// Held while a downloaded list is written and applied.
    pub(crate) persist_lock: tokio::sync::Mutex<()>,
    default_expiry_days: u32,
    sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for FilterProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterProfile")
            .field("info", &*self.info.read())
            .field("built", &self.rules.load().is_some())
            .finish()
    }
}

impl FilterProfile {
    /// Open the list at `path`, reading only its header.
    ///
    /// A list without the format marker stays usable: it never blocks
    /// anything and a load diagnostic is reported.
    pub fn open(path: &Path, default_expiry_days: u32, sink: Arc<dyn DiagnosticSink>) -> Self {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let info = match read_header(path) {
            Ok(header) => ProfileInfo::from_header(name, path.to_path_buf(), &header, default_expiry_days),
            Err(e) => {
                sink.report(Diagnostic::error(DiagnosticCategory::Load, e.to_string()));
                ProfileInfo::invalid(name, path.to_path_buf(), default_expiry_days)
            }
        };

        Self {
            info: RwLock::new(info),
            rules: ArcSwapOption::empty(),
            load_lock: Mutex::new(()),
            pending_text: Mutex::new(None),
            update_ticket: AtomicU64::new(0),
            persist_lock: tokio::sync::Mutex::new(()),
            default_expiry_days,
            sink,
        }
    }

    pub fn info(&self) -> ProfileInfo {
        self.info.read().clone()
    }

    pub fn name(&self) -> String {
        self.info.read().name.clone()
    }

    pub fn path(&self) -> PathBuf {
        self.info.read().path.clone()
    }

    pub fn update_url(&self) -> Option<String> {
        self.info.read().update_url.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.rules.load().is_some()
    }

    /// Whether the list should be downloaded again.
    ///
    /// Lists already refreshed this session are never stale. Otherwise a
    /// list is stale when it has no rules but knows where to get them, or
    /// when its last modification is older than its expiry.
    pub fn needs_update(&self, now: DateTime<Utc>) -> bool {
        let info = self.info.read();
        if info.is_up_to_date {
            return false;
        }
        if info.is_empty && info.update_url.is_some() {
            return true;
        }
        match info.last_update {
            Some(last_update) => is_expired(last_update, info.expires_days, now),
            None => false,
        }
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        self.sink.report(diagnostic);
    }

    // ========================================================================
    // Rule building
    // ========================================================================

    /// Current rules, building them first if needed.
    pub fn rules(&self) -> Arc<RuleSet> {
        if let Some(rules) = self.rules.load_full() {
            return rules;
        }

        let _guard = self.load_lock.lock();
        if let Some(rules) = self.rules.load_full() {
            return rules;
        }

        let rules = Arc::new(self.build_rules());
        self.rules.store(Some(Arc::clone(&rules)));
        self.info.write().is_loaded = true;
        rules
    }

    /// Build the rules on a background thread.
    pub fn preload(self: &Arc<Self>) {
        if self.is_loaded() {
            return;
        }

        let profile = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("bw-load-{}", self.name()))
            .spawn(move || {
                profile.rules();
            });
        if let Err(e) = spawned {
            log::warn!("Failed to spawn loader for '{}': {}", self.name(), e);
        }
    }

    fn build_rules(&self) -> RuleSet {
        let path = self.path();
        let pending = self.pending_text.lock().take();
        let text = match pending {
            Some(text) => text,
            // Already reported when the header was read.
            None if !self.info.read().is_valid => return RuleSet::empty(),
            None => match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(source) => {
                    let e = ProfileError::Io { path, source };
                    self.sink.report(Diagnostic::error(DiagnosticCategory::Load, e.to_string()));
                    return RuleSet::empty();
                }
            },
        };

        if let Err(source) = parse_header(&text) {
            let e = ProfileError::Malformed { path, source };
            self.sink.report(Diagnostic::error(DiagnosticCategory::Load, e.to_string()));
            self.info.write().is_valid = false;
            return RuleSet::empty();
        }

        let (rules, stats) = build_rule_set(&text);
        log::info!(
            "Loaded '{}': {} network rules ({} exceptions), {} generic selectors, {} rejected",
            path.display(),
            rules.trie().len(),
            stats.exception_rules,
            stats.generic_hide,
            stats.rejected
        );
        rules
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Start an update; only the latest ticket may complete.
    pub(crate) fn begin_update(&self) -> u64 {
        self.update_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current_update(&self, ticket: u64) -> bool {
        self.update_ticket.load(Ordering::SeqCst) == ticket
    }

    /// Replace the rules with those of `text`.
    ///
    /// `text` must already carry the format marker. Metadata is updated
    /// right away and the new rules are built in the background; queries in
    /// between build them on demand.
    pub fn apply_update(self: &Arc<Self>, text: String) {
        let header = match parse_header(&text) {
            Ok(header) => header,
            Err(e) => {
                self.sink.report(Diagnostic::error(DiagnosticCategory::Load, e.to_string()));
                return;
            }
        };

        let old = {
            let _guard = self.load_lock.lock();
            {
                let mut info = self.info.write();
                let (name, path) = (info.name.clone(), info.path.clone());
                let previous_url = info.update_url.take();
                *info = ProfileInfo::from_header(name, path, &header, self.default_expiry_days);
                if info.update_url.is_none() {
                    info.update_url = previous_url;
                }
                info.is_up_to_date = true;
            }
            *self.pending_text.lock() = Some(text);
            self.rules.swap(None)
        };

        if let Some(old) = old {
            let spawned = thread::Builder::new()
                .name("bw-teardown".to_string())
                .spawn(move || drop(old));
            if let Err(e) = spawned {
                log::debug!("Dropping old rules inline: {}", e);
            }
        }

        self.preload();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_blocked(&self, request: &Request<'_>, base_url: &str) -> bool {
        let rules = self.rules();
        Matcher::new(&rules).is_blocked(request, base_url)
    }

    pub fn style_sheet(&self) -> String {
        self.rules().style_sheet().to_string()
    }

    pub fn hide_map(&self) -> CosmeticMap {
        self.rules().hide_map().clone()
    }

    pub fn unhide_map(&self) -> CosmeticMap {
        self.rules().unhide_map().clone()
    }

    pub fn page_selectors(&self, page_host: &str) -> PageSelectors {
        self.rules().page_selectors(page_host)
    }
}

/// Read just the header block of a list file.
fn read_header(path: &Path) -> Result<ListHeader, ProfileError> {
    let io_error = |source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;

    let mut text = String::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_error)?;
        let trimmed = line.trim();
        let is_rule = !text.is_empty() && !trimmed.is_empty() && !trimmed.starts_with('!');
        text.push_str(&line);
        text.push('\n');
        if is_rule {
            break;
        }
    }

    parse_header(&text).map_err(|source| ProfileError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
