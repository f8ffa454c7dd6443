//! Registry and update tests over real list files in a temporary directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bw_compiler::checksum::compute_checksum;
use bw_compiler::ChecksumStatus;
use bw_core::types::{Request, RequestHeader};
use bw_profiles::{
    BlockingRegistry, DiagnosticCategory, Fetch, FetchResponse, MemorySink, RegistryConfig, UpdateError, UpdateFetcher,
};

const EASY_URL: &str = "https://lists.example/easy.txt";

const EASY: &str = "[Adblock Plus 2.0]\n\
    ! Title: Easy List\n\
    ! Expires: 4 days\n\
    ! URL: https://lists.example/easy.txt\n\
    ||ads.example.com^\n\
    @@||ads.example.com/ok^\n\
    ||old.example^\n\
    ##.ad\n\
    ##.promo\n\
    example.com##.sidebar\n\
    news.example.com#@#.sidebar\n";

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bw-registry-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &Path, file: &str, content: &str) {
    fs::write(dir.join(file), content).unwrap();
}

fn config(dir: &Path) -> RegistryConfig {
    RegistryConfig {
        auto_update: false,
        ..RegistryConfig::new(dir.join("blocking"))
    }
}

fn registry_with(name: &str, lists: &[(&str, &str)]) -> (BlockingRegistry, Arc<MemorySink>, PathBuf) {
    let dir = test_dir(name);
    let config = config(&dir);
    fs::create_dir_all(&config.profile_dir).unwrap();
    for (file, content) in lists {
        write(&config.profile_dir, file, content);
    }

    let sink = Arc::new(MemorySink::new());
    let mut registry = BlockingRegistry::with_sink(config.clone(), sink.clone());
    registry.load_profiles().unwrap();
    (registry, sink, config.profile_dir)
}

/// Add a valid checksum line after the marker.
fn with_checksum(list: &str) -> String {
    let checksum = compute_checksum(list);
    let (marker, body) = list.split_once('\n').unwrap();
    format!("{}\n! Checksum: {}\n{}", marker, checksum, body)
}

/// Serves canned responses by URL.
struct CannedFetch {
    responses: HashMap<String, FetchResponse>,
    calls: AtomicUsize,
    first_call_delay: Option<Duration>,
}

impl CannedFetch {
    fn new(url: &str, status: u16, body: &str) -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            url.to_string(),
            FetchResponse {
                status,
                body: body.as_bytes().to_vec(),
            },
        );
        Self {
            responses,
            calls: AtomicUsize::new(0),
            first_call_delay: None,
        }
    }
}

#[async_trait]
impl Fetch for CannedFetch {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, UpdateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let (0, Some(delay)) = (call, self.first_call_delay) {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| UpdateError::Transport(format!("connection refused: {}", url)))
    }
}

// ============================================================================
// Bootstrap and queries
// ============================================================================

#[test]
fn profiles_are_indexed_by_file_name() {
    let (registry, _, _) = registry_with(
        "indexing",
        &[("easy.txt", EASY), ("another.txt", "[Adblock Plus 2.0]\n||x.com^\n"), ("notes.md", "x")],
    );

    let names: Vec<String> = registry.profiles().into_iter().map(|info| info.name).collect();
    assert_eq!(names, vec!["another", "easy"]);
    assert_eq!(registry.profile_indices(&["easy", "missing", "another"]), vec![1, 0]);

    let info = &registry.profiles()[1];
    assert_eq!(info.title, "Easy List");
    assert_eq!(info.update_url.as_deref(), Some(EASY_URL));
    assert!(!info.is_loaded);
}

#[test]
fn blocks_across_selected_profiles() {
    let (registry, _, _) = registry_with("blocking", &[("easy.txt", EASY)]);
    let easy = registry.profile_indices(&["easy"]);

    assert!(registry.is_url_blocked(&easy, &Request::new("http://ads.example.com/banner.png"), ""));
    assert!(!registry.is_url_blocked(&easy, &Request::new("http://notads.example.com/banner.png"), ""));
    assert!(!registry.is_url_blocked(&easy, &Request::new("http://ads.example.com/ok/img.png"), ""));
    assert!(registry.is_url_blocked(&easy, &Request::new("https://old.example/x"), "https://news.org/"));
}

#[test]
fn registry_prefilters_requests() {
    let (registry, _, _) = registry_with("prefilter", &[("easy.txt", EASY)]);

    let request = Request::new("http://ads.example.com/banner.png");
    assert!(!registry.is_url_blocked(&[], &request, ""));
    assert!(!registry.is_url_blocked(&[5, 9], &request, ""));
    assert!(registry.is_url_blocked(&[5, 0], &request, ""));
    assert!(!registry.is_url_blocked(&[0], &Request::new("ftp://ads.example.com/banner.png"), ""));
    assert!(!registry.is_url_blocked(&[0], &Request::new("data:text/plain,ads.example.com"), ""));
}

#[test]
fn headers_reach_the_matcher() {
    let (registry, _, _) = registry_with(
        "headers",
        &[("xhr.txt", "[Adblock Plus 2.0]\n||api.example.com^$xmlhttprequest\n")],
    );

    let xhr = [RequestHeader {
        name: "X-Requested-With",
        value: "XMLHttpRequest",
    }];
    let url = "http://api.example.com/data";
    assert!(registry.is_url_blocked(&[0], &Request::with_headers(url, &xhr), ""));
    assert!(!registry.is_url_blocked(&[0], &Request::new(url), ""));
}

#[test]
fn malformed_profile_never_blocks() {
    let (registry, sink, _) = registry_with("malformed", &[("broken.txt", "||ads.example.com^\n##.ad\n")]);

    assert_eq!(registry.len(), 1);
    assert!(sink.has(DiagnosticCategory::Load));
    assert!(!registry.profiles()[0].is_valid);
    assert!(!registry.is_url_blocked(&[0], &Request::new("http://ads.example.com/banner.png"), ""));
    assert_eq!(registry.style_sheet(&[0]), "");
}

#[test]
fn cosmetic_queries_merge_profiles() {
    let (registry, _, _) = registry_with(
        "cosmetic",
        &[
            ("easy.txt", EASY),
            ("extra.txt", "[Adblock Plus 2.0]\n##.banner\nexample.com##.popup\n"),
        ],
    );

    assert_eq!(registry.style_sheet(&[0]), ".ad,.promo{display:none;}");
    assert_eq!(
        registry.style_sheet(&[0, 1]),
        ".ad,.promo{display:none;}.banner{display:none;}"
    );

    let hide = registry.hide_map(&[0, 1]);
    assert_eq!(hide.selectors("example.com"), &[".sidebar", ".popup"]);
    let unhide = registry.unhide_map(&[0, 1]);
    assert_eq!(unhide.selectors("news.example.com"), &[".sidebar"]);
    assert!(unhide.selectors("example.com").is_empty());

    let page = registry.page_selectors(&[0, 1], "https://news.example.com/story");
    assert_eq!(page.hide, vec![".sidebar", ".popup"]);
    assert_eq!(page.unhide, vec![".sidebar"]);
}

#[test]
fn load_profiles_is_idempotent() {
    let (mut registry, _, dir) = registry_with("idempotent", &[("easy.txt", EASY)]);
    write(&dir, "late.txt", "[Adblock Plus 2.0]\n");

    assert_eq!(registry.load_profiles().unwrap(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn bundled_lists_are_installed_once() {
    let dir = test_dir("bundled");
    let bundled = dir.join("bundled");
    fs::create_dir_all(&bundled).unwrap();
    write(&bundled, "easy.txt", EASY);
    write(&bundled, "privacy.txt", "[Adblock Plus 2.0]\n||tracker.example^\n");

    let config = RegistryConfig {
        bundled_dir: Some(bundled),
        ..config(&dir)
    };
    fs::create_dir_all(&config.profile_dir).unwrap();
    write(&config.profile_dir, "easy.txt", "[Adblock Plus 2.0]\n! Title: Mine\n");

    let mut registry = BlockingRegistry::with_sink(config.clone(), Arc::new(MemorySink::new()));
    assert_eq!(registry.load_profiles().unwrap(), 2);

    let user_copy = fs::read_to_string(config.profile_dir.join("easy.txt")).unwrap();
    assert!(user_copy.contains("! Title: Mine"));
    assert!(config.profile_dir.join("privacy.txt").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(config.profile_dir.join("privacy.txt")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}

#[test]
fn missing_profile_dir_is_created() {
    let dir = test_dir("create");
    let config = config(&dir);
    let mut registry = BlockingRegistry::with_sink(config.clone(), Arc::new(MemorySink::new()));

    assert_eq!(registry.load_profiles().unwrap(), 0);
    assert!(config.profile_dir.is_dir());
    assert!(registry.is_empty());
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn refresh_rebuilds_rules() {
    let (registry, sink, dir) = registry_with("refresh", &[("easy.txt", EASY)]);
    let profile = registry.profile(0).unwrap();
    assert!(registry.is_url_blocked(&[0], &Request::new("http://old.example/a"), ""));

    let update = with_checksum("[Adblock Plus 2.0]\n! Title: Easy List\n||new.example^\n##.fresh\n");
    let fetcher = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, &update)));

    let outcome = fetcher.refresh(profile).await.unwrap();
    assert_eq!(outcome.checksum, ChecksumStatus::Verified);
    assert!(outcome.persisted);

    assert!(!registry.is_url_blocked(&[0], &Request::new("http://old.example/a"), ""));
    assert!(registry.is_url_blocked(&[0], &Request::new("http://new.example/a"), ""));
    assert_eq!(registry.style_sheet(&[0]), ".fresh{display:none;}");
    assert!(registry.profiles()[0].is_up_to_date);
    assert!(sink.entries().is_empty());

    let stored = fs::read_to_string(dir.join("easy.txt")).unwrap();
    let mut lines = stored.lines();
    assert_eq!(lines.next(), Some("[Adblock Plus 2.0]"));
    assert_eq!(lines.next(), Some("! URL: https://lists.example/easy.txt"));
    assert!(lines.next().is_some_and(|line| line.starts_with("! Last modified: ")));
    assert!(stored.contains("||new.example^"));
    assert!(!dir.join("easy.txt.part").exists());
}

#[tokio::test]
async fn refresh_applies_even_when_the_list_cannot_be_saved() {
    let (registry, sink, dir) = registry_with("unwritable", &[("easy.txt", EASY)]);
    fs::create_dir_all(dir.join("easy.txt.part")).unwrap();

    let update = with_checksum("[Adblock Plus 2.0]\n! Title: Easy List\n||new.example^\n");
    let fetcher = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, &update)));

    let outcome = fetcher.refresh(registry.profile(0).unwrap()).await.unwrap();
    assert!(!outcome.persisted);
    assert!(sink.has(DiagnosticCategory::Write));

    assert!(registry.is_url_blocked(&[0], &Request::new("http://new.example/a"), ""));
    assert!(!registry.is_url_blocked(&[0], &Request::new("http://old.example/a"), ""));
    assert_eq!(fs::read_to_string(dir.join("easy.txt")).unwrap(), EASY);
}

#[tokio::test]
async fn checksum_mismatch_keeps_old_state() {
    let (registry, sink, dir) = registry_with("mismatch", &[("easy.txt", EASY)]);
    let update = "[Adblock Plus 2.0]\n! Checksum: AAAAAAAAAAAAAAAAAAAAAA\n||new.example^\n";
    let fetcher = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, update)));

    let result = fetcher.refresh(registry.profile(0).unwrap()).await;
    assert!(matches!(result, Err(UpdateError::Checksum(_))));
    assert!(sink.has(DiagnosticCategory::Checksum));

    assert!(registry.is_url_blocked(&[0], &Request::new("http://old.example/a"), ""));
    assert!(!registry.is_url_blocked(&[0], &Request::new("http://new.example/a"), ""));
    assert_eq!(fs::read_to_string(dir.join("easy.txt")).unwrap(), EASY);
    assert!(!registry.profiles()[0].is_up_to_date);
}

#[tokio::test]
async fn failed_downloads_keep_old_state() {
    let (registry, sink, _) = registry_with("failures", &[("easy.txt", EASY)]);
    let profile = registry.profile(0).unwrap();

    let not_found = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 404, "not found")));
    assert!(matches!(not_found.refresh(profile).await, Err(UpdateError::HttpStatus(404))));

    let not_a_list = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, "<html></html>")));
    assert!(matches!(not_a_list.refresh(profile).await, Err(UpdateError::Malformed(_))));

    let unreachable = UpdateFetcher::new(Arc::new(CannedFetch::new("https://elsewhere.example/", 200, "")));
    assert!(matches!(unreachable.refresh(profile).await, Err(UpdateError::Transport(_))));

    assert_eq!(sink.take().len(), 3);
    assert!(registry.is_url_blocked(&[0], &Request::new("http://old.example/a"), ""));
}

#[tokio::test]
async fn refresh_requires_update_url() {
    let (registry, _, _) = registry_with("no-url", &[("local.txt", "[Adblock Plus 2.0]\n||a.com^\n")]);
    let fetcher = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, EASY)));

    let result = fetcher.refresh(registry.profile(0).unwrap()).await;
    assert!(matches!(result, Err(UpdateError::NoUpdateUrl(name)) if name == "local"));
}

#[tokio::test]
async fn refresh_stale_updates_empty_lists() {
    let (registry, _, _) = registry_with(
        "stale",
        &[
            ("easy.txt", "[Adblock Plus 2.0]\n! URL: https://lists.example/easy.txt\n"),
            ("local.txt", "[Adblock Plus 2.0]\n||a.com^\n"),
        ],
    );
    assert_eq!(registry.stale_profiles(), vec![0]);

    let fetcher = UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, EASY)));
    let results = registry.refresh_stale(&fetcher).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].1.is_ok());

    assert!(registry.stale_profiles().is_empty());
    assert!(registry.is_url_blocked(&[0], &Request::new("http://ads.example.com/x"), ""));
}

#[tokio::test]
async fn newer_refresh_supersedes_older() {
    let (registry, _, _) = registry_with("supersede", &[("easy.txt", EASY)]);
    let profile = registry.profile(0).unwrap();

    let mut fetch = CannedFetch::new(EASY_URL, 200, "[Adblock Plus 2.0]\n||new.example^\n");
    fetch.first_call_delay = Some(Duration::from_millis(200));
    let fetcher = UpdateFetcher::new(Arc::new(fetch));

    let (first, second) = tokio::join!(fetcher.refresh(profile), fetcher.refresh(profile));
    assert!(matches!(first, Err(UpdateError::Superseded)));
    assert!(second.is_ok());
    assert!(registry.is_url_blocked(&[0], &Request::new("http://new.example/a"), ""));
}

#[tokio::test]
async fn spawned_updates_run_on_the_runtime() {
    let (registry, _, _) = registry_with(
        "spawned",
        &[("easy.txt", "[Adblock Plus 2.0]\n! URL: https://lists.example/easy.txt\n")],
    );

    let fetcher = Arc::new(UpdateFetcher::new(Arc::new(CannedFetch::new(EASY_URL, 200, EASY))));
    let handles = registry.spawn_updates(&tokio::runtime::Handle::current(), fetcher);
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(registry.profiles()[0].is_up_to_date);
    assert!(registry.is_url_blocked(&[0], &Request::new("http://ads.example.com/x"), ""));
}
