//! Command-line interface for folio.
//!
//! Provides commands for inspecting chapters, fetching and clearing their
//! payloads, unlocking them and watching release times.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config;
use crate::core::{Chapter, Library};
use crate::domain::FetchMode;

/// How often `watch` ticks the release gates
const RELEASE_TICK: Duration = Duration::from_secs(1);

/// folio - Chapter lock and content coordinator
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every configured chapter
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Fetch a chapter's payload
    Fetch {
        /// Chapter (product) id
        id: String,

        /// Raise the loading indicator and refetch even when loaded
        #[arg(short, long)]
        explicit: bool,
    },

    /// Drop the cached payload and fetch it again
    Reload {
        /// Chapter (product) id
        id: String,
    },

    /// Evict every cached version of a chapter's payload
    Clear {
        /// Chapter (product) id
        id: String,
    },

    /// Unlock a chapter permanently
    Unlock {
        /// Chapter (product) id
        id: String,
    },

    /// Refresh and print a chapter's price label
    Price {
        /// Chapter (product) id
        id: String,
    },

    /// Print the time left until a chapter's release
    Countdown {
        /// Chapter (product) id
        id: String,
    },

    /// Start every chapter and print events as JSON lines until Ctrl-C
    Watch,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Status { json } => show_status(json).await,
            Commands::Fetch { id, explicit } => fetch_chapter(&id, explicit).await,
            Commands::Reload { id } => reload_chapter(&id).await,
            Commands::Clear { id } => clear_chapter(&id).await,
            Commands::Unlock { id } => unlock_chapter(&id).await,
            Commands::Price { id } => show_price(&id).await,
            Commands::Countdown { id } => show_countdown(&id).await,
            Commands::Watch => watch().await,
            Commands::Config => show_config().await,
        }
    }
}

async fn open_library() -> Result<Library> {
    let cfg = config::config()?;
    if cfg.chapters.is_empty() {
        warn!("No chapters configured");
    }
    Library::open(cfg).await
}

/// Wait for a fetch task, printing transfer progress to stderr
async fn await_fetch(chapter: &Chapter, handle: JoinHandle<()>) -> Result<()> {
    let mut progress = chapter.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let fraction = *progress.borrow_and_update();
            eprint!("\r{:>3}%", (fraction.clamp(0.0, 1.0) * 100.0).round() as u8);
        }
    });

    let result = handle.await.context("Fetch task failed");
    reporter.abort();
    eprintln!();
    result
}

fn print_summary(chapter: &Chapter) -> Result<()> {
    let snapshot = chapter.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Show every chapter
async fn show_status(json: bool) -> Result<()> {
    let library = open_library().await?;

    if json {
        let snapshots: Vec<_> = library.chapters().iter().map(Chapter::snapshot).collect();
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if library.chapters().is_empty() {
        println!("No chapters configured");
        return Ok(());
    }

    println!(
        "{:<20} {:<24} {:<8} {:<34} {:<12}",
        "CHAPTER", "LOCK", "CACHED", "VERSION", "PRICE"
    );
    println!("{}", "-".repeat(100));

    for chapter in library.chapters() {
        let cached = if chapter.is_preloaded() {
            "bundled"
        } else if chapter.was_loaded() {
            "yes"
        } else {
            "no"
        };
        println!(
            "{:<20} {:<24} {:<8} {:<34} {:<12}",
            chapter.id(),
            chapter.lock_state().to_string(),
            cached,
            chapter.version().to_string(),
            chapter.price()
        );
    }

    Ok(())
}

/// Apply both unlock paths a session start would: a release that already
/// passed, then the purchase check
async fn ensure_unlocked(chapter: &Chapter) {
    if !chapter.settle_release() {
        chapter.check_ownership().await;
    }
}

/// Fetch a chapter's payload
async fn fetch_chapter(id: &str, explicit: bool) -> Result<()> {
    let library = open_library().await?;
    let chapter = library.require(id)?;
    ensure_unlocked(chapter).await;

    let mode = if explicit {
        FetchMode::Explicit
    } else {
        FetchMode::Silent
    };

    match chapter.fetch(mode) {
        Some(handle) => await_fetch(chapter, handle).await?,
        None => eprintln!("[Nothing to fetch for {}: {}, {}]", id, chapter.lock_state(), chapter.load_state()),
    }

    print_summary(chapter)
}

/// Clear and refetch a chapter's payload
async fn reload_chapter(id: &str) -> Result<()> {
    let library = open_library().await?;
    let chapter = library.require(id)?;
    ensure_unlocked(chapter).await;

    match chapter.reload().await {
        Some(handle) => await_fetch(chapter, handle).await?,
        None => eprintln!("[Cannot reload {}: {}]", id, chapter.lock_state()),
    }

    print_summary(chapter)
}

/// Evict a chapter's cached payload
async fn clear_chapter(id: &str) -> Result<()> {
    let library = open_library().await?;
    let chapter = library.require(id)?;
    ensure_unlocked(chapter).await;

    // a fresh process holds no payload; bring back the cached one first
    if !chapter.has_payload() && chapter.was_loaded() {
        if let Some(handle) = chapter.fetch(FetchMode::Silent) {
            await_fetch(chapter, handle).await?;
        }
    }

    let cleared = chapter
        .clear_cache()
        .await
        .with_context(|| format!("Nothing to clear for {}", id))?;

    if cleared {
        println!("Cleared cached payload of {}", id);
    } else {
        anyhow::bail!("Cached payload of {} was not fully evicted", id);
    }
    Ok(())
}

/// Unlock a chapter
async fn unlock_chapter(id: &str) -> Result<()> {
    let library = open_library().await?;
    let chapter = library.require(id)?;

    if chapter.unlock() {
        println!("Unlocked {}", id);
    } else {
        println!("{} was already unlocked", id);
    }
    Ok(())
}

/// Refresh and print a chapter's price
async fn show_price(id: &str) -> Result<()> {
    let library = open_library().await?;
    let chapter = library.require(id)?;

    chapter.refresh_price().await;
    let price = chapter.price();
    if price.is_empty() {
        println!("(no price)");
    } else {
        println!("{}", price);
    }
    Ok(())
}

/// Print the release countdown
async fn show_countdown(id: &str) -> Result<()> {
    let library = open_library().await?;
    let chapter = library.require(id)?;

    let remaining = chapter.release_time_string();
    if remaining.is_empty() {
        println!("{}: {}", id, chapter.lock_state());
    } else {
        println!("{}", remaining);
    }
    Ok(())
}

/// Start every chapter and stream its events
async fn watch() -> Result<()> {
    let library = open_library().await?;
    let mut events = library.subscribe();

    let mut tasks = library.start().await;
    for chapter in library.chapters() {
        tasks.push(chapter.watch_release(RELEASE_TICK));
    }
    info!(chapters = library.chapters().len(), "Watching chapters; Ctrl-C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    use crate::config::paths;

    let cfg = config::config()?;

    println!("folio configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", cfg.home.display());
    println!("  Bundled payloads:    {}", cfg.bundled.display());
    println!("  Preferences:         {}", paths::prefs_file_in(&cfg.home).display());
    println!("  Cache:               {}", paths::cache_dir_in(&cfg.home).display());
    println!("  Notifications:       {}", paths::notifications_journal_in(&cfg.home).display());
    println!();
    println!("Locale: {}", cfg.locale);
    println!();
    println!("Network:");
    println!("  Timeout:       {}s", cfg.network.timeout.as_secs());
    println!("  Poll interval: {}ms", cfg.network.poll_interval.as_millis());
    println!();
    println!("Chapters:");
    if cfg.chapters.is_empty() {
        println!("  (none)");
    }
    for chapter in &cfg.chapters {
        let release = chapter
            .release_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} preloaded={:<5} release={} locales={}",
            chapter.id,
            chapter.preloaded,
            release,
            chapter.locales.len()
        );
    }

    Ok(())
}
