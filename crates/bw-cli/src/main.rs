//! blockwise CLI
//!
//! CLI tool for inspecting filter profiles, testing requests against them
//! and updating them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use bw_compiler::{build_rule_set, parse_header, verify_checksum, ChecksumStatus};
use bw_core::types::{Request, RequestHeader};
use bw_profiles::{BlockingRegistry, RegistryConfig, UpdateFetcher};

#[derive(Parser)]
#[command(name = "bw-cli")]
#[command(about = "blockwise content blocking profiles and tools")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Profile directory, overrides the configuration
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Directory of bundled default lists
    #[arg(long, global = true)]
    bundled: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Profile names to use (all profiles when omitted)
    #[arg(short, long = "profile")]
    profiles: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed profiles
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check whether a request would be blocked
    Check {
        /// Request URL
        url: String,

        /// URL of the page making the request
        #[arg(short, long, default_value = "")]
        base: String,

        /// Request header as Name:Value
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[command(flatten)]
        selection: Selection,
    },

    /// Print the generic hiding style sheet
    Stylesheet {
        #[command(flatten)]
        selection: Selection,
    },

    /// Print hide and unhide selectors for a page
    Selectors {
        /// Page URL or host
        page: String,

        #[command(flatten)]
        selection: Selection,
    },

    /// Download profile updates
    Update {
        /// Update every profile with an update URL, not only stale ones
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        selection: Selection,
    },

    /// Parse a filter list file and print statistics
    Parse {
        /// Filter list file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_log(cli.verbose);

    let result = match &cli.command {
        Commands::List { json } => open_registry(&cli).and_then(|registry| cmd_list(&registry, *json)),
        Commands::Check {
            url,
            base,
            headers,
            selection,
        } => open_registry(&cli).and_then(|registry| cmd_check(&registry, url, base, headers, selection)),
        Commands::Stylesheet { selection } => {
            open_registry(&cli).and_then(|registry| cmd_stylesheet(&registry, selection))
        }
        Commands::Selectors { page, selection } => {
            open_registry(&cli).and_then(|registry| cmd_selectors(&registry, page, selection))
        }
        Commands::Update { all, selection } => {
            open_registry(&cli).and_then(|registry| cmd_update(&registry, *all, selection))
        }
        Commands::Parse { file } => cmd_parse(file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_log(verbose: bool) {
    let colors = fern::colors::ColoredLevelConfig::new();
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let result = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S%.3f]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn default_profile_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config").join("blockwise").join("blocking"),
        None => PathBuf::from("blocking"),
    }
}

fn open_registry(cli: &Cli) -> Result<BlockingRegistry, String> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::from_file(path).map_err(|e| e.to_string())?,
        None => RegistryConfig::new(default_profile_dir()),
    };
    if let Some(dir) = &cli.dir {
        config.profile_dir = dir.clone();
    }
    if let Some(bundled) = &cli.bundled {
        config.bundled_dir = Some(bundled.clone());
    }
    // Updates only run through the `update` command.
    config.auto_update = false;

    let mut registry = BlockingRegistry::new(config);
    registry.load_profiles().map_err(|e| e.to_string())?;
    Ok(registry)
}

fn select(registry: &BlockingRegistry, selection: &Selection) -> Result<Vec<usize>, String> {
    if selection.profiles.is_empty() {
        return Ok((0..registry.len()).collect());
    }

    let indices = registry.profile_indices(&selection.profiles);
    if indices.len() != selection.profiles.len() {
        let known: Vec<String> = registry.profiles().into_iter().map(|info| info.name).collect();
        let unknown: Vec<&str> = selection
            .profiles
            .iter()
            .filter(|name| !known.contains(name))
            .map(String::as_str)
            .collect();
        return Err(format!("Unknown profile(s): {}", unknown.join(", ")));
    }
    Ok(indices)
}

fn cmd_list(registry: &BlockingRegistry, json: bool) -> Result<(), String> {
    let profiles = registry.profiles();

    if json {
        let output = serde_json::to_string_pretty(&profiles).map_err(|e| e.to_string())?;
        println!("{}", output);
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles in '{}'", registry.config().profile_dir.display());
        return Ok(());
    }

    let now = chrono::Utc::now();
    for (index, info) in profiles.iter().enumerate() {
        let stale = registry
            .profile(index)
            .is_some_and(|profile| profile.needs_update(now));
        println!("[{}] {} ({})", index, info.title, info.name);
        println!("  Path:        {}", info.path.display());
        println!("  Update URL:  {}", info.update_url.as_deref().unwrap_or("-"));
        match info.last_update {
            Some(last_update) => println!("  Updated:     {}", last_update.format("%Y-%m-%d %H:%M UTC")),
            None => println!("  Updated:     unknown"),
        }
        println!("  Expires:     {} days", info.expires_days);
        println!(
            "  State:       {}{}",
            if info.is_valid { "valid" } else { "invalid" },
            if stale { ", stale" } else { "" }
        );
    }

    Ok(())
}

fn parse_header_arg(header: &str) -> Result<RequestHeader<'_>, String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("Invalid header '{}', expected Name:Value", header))?;
    Ok(RequestHeader {
        name: name.trim(),
        value: value.trim(),
    })
}

fn cmd_check(
    registry: &BlockingRegistry,
    url: &str,
    base: &str,
    headers: &[String],
    selection: &Selection,
) -> Result<(), String> {
    let indices = select(registry, selection)?;
    let headers = headers
        .iter()
        .map(|header| parse_header_arg(header))
        .collect::<Result<Vec<_>, _>>()?;
    let request = Request::with_headers(url, &headers);

    let start = Instant::now();
    let blocked = registry.is_url_blocked(&indices, &request, base);
    let elapsed = start.elapsed();

    println!("{} {}", if blocked { "BLOCK" } else { "ALLOW" }, url);
    if blocked {
        for &index in &indices {
            let profile = match registry.profile(index) {
                Some(profile) => profile,
                None => continue,
            };
            if profile.is_blocked(&request, base) {
                println!("  Blocked by:  {}", profile.name());
            }
        }
    }
    println!("  Time:        {:.3}ms", elapsed.as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_stylesheet(registry: &BlockingRegistry, selection: &Selection) -> Result<(), String> {
    let indices = select(registry, selection)?;
    println!("{}", registry.style_sheet(&indices));
    Ok(())
}

fn cmd_selectors(registry: &BlockingRegistry, page: &str, selection: &Selection) -> Result<(), String> {
    let indices = select(registry, selection)?;
    let selectors = registry.page_selectors(&indices, page);

    println!("Hide ({}):", selectors.hide.len());
    for selector in &selectors.hide {
        println!("  {}", selector);
    }
    println!("Unhide ({}):", selectors.unhide.len());
    for selector in &selectors.unhide {
        println!("  {}", selector);
    }

    Ok(())
}

fn cmd_update(registry: &BlockingRegistry, all: bool, selection: &Selection) -> Result<(), String> {
    let indices: Vec<usize> = if all {
        (0..registry.len())
            .filter(|&index| {
                registry
                    .profile(index)
                    .is_some_and(|profile| profile.update_url().is_some())
            })
            .collect()
    } else if !selection.profiles.is_empty() {
        select(registry, selection)?
    } else {
        registry.stale_profiles()
    };

    if indices.is_empty() {
        println!("Nothing to update");
        return Ok(());
    }

    let fetcher = UpdateFetcher::http(registry.config()).map_err(|e| e.to_string())?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {}", e))?;
    let results = runtime.block_on(registry.refresh(&indices, &fetcher));

    let mut failures = 0usize;
    for (index, result) in results {
        let name = registry
            .profile(index)
            .map(|profile| profile.name())
            .unwrap_or_default();
        match result {
            Ok(outcome) => {
                let checksum = match outcome.checksum {
                    ChecksumStatus::Verified => "checksum verified",
                    ChecksumStatus::Absent => "no checksum",
                };
                let saved = if outcome.persisted { "" } else { ", not saved" };
                println!("Updated {} ({}{})", name, checksum, saved);
            }
            Err(e) => {
                failures += 1;
                println!("Failed {}: {}", name, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} update(s) failed", failures));
    }
    Ok(())
}

fn cmd_parse(file: &Path) -> Result<(), String> {
    let content = fs::read_to_string(file).map_err(|e| format!("Failed to read '{}': {}", file.display(), e))?;

    let header = parse_header(&content).map_err(|e| format!("Invalid filter list: {}", e))?;
    let checksum = verify_checksum(&content).map_err(|e| e.to_string())?;

    let start = Instant::now();
    let (rules, stats) = build_rule_set(&content);
    let parse_time = start.elapsed();

    println!("Filter list: {}", file.display());
    println!("  Title:       {}", header.title.as_deref().unwrap_or("-"));
    println!("  Checksum:    {:?}", checksum);
    println!("  Lines:       {}", stats.lines);
    println!(
        "  Network:     {} rules ({} exceptions, {} replaced), {} trie nodes",
        stats.network_rules,
        stats.exception_rules,
        stats.replaced_rules,
        rules.trie().node_count()
    );
    println!("  Generic:     {} selectors", stats.generic_hide);
    println!("  Hide:        {} domain entries", stats.hide_entries);
    println!("  Unhide:      {} domain entries", stats.unhide_entries);
    println!("  Ignored:     {}", stats.ignored);
    println!("  Rejected:    {}", stats.rejected);
    println!("  Time:        {:.1}ms", parse_time.as_secs_f64() * 1000.0);

    Ok(())
}
