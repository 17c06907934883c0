//! Replay an access log through the learning cache.
//!
//! Each non-comment line is `<offset_ms> <session> <path> [leaf]`:
//!
//! ```text
//! # t(ms) session path          kind
//! 0       a       /index.html
//! 12      a       /app.js       leaf
//! 15      a       /site.css     leaf
//! 900     b       /index.html
//! ```
//!
//! Offsets drive a virtual clock, so a log spanning hours replays
//! instantly. Session labels map to fresh sessions; all are closed once
//! the log ends and the last warm-up windows have been evaluated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use autopush::config::AutoPushConfig;
use autopush::learning::{LearningStats, ManualScheduler, RelatedPaths};
use autopush::planner::{BoxFuture, FsSizeLookup, PushPlan, SizeLookup, SizeLookupError};
use autopush::push::{AutoPush, MemoryTransport};
use autopush::telemetry::MetricsSnapshot;
use autopush::SessionId;
use clap::Args;
use serde_json::json;
use tracing::{debug, info};

use crate::error::CliError;

/// Asset size assumed when no asset root is given.
pub const DEFAULT_ASSET_SIZE: u64 = 1024;

/// Arguments for the replay command.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Access log to replay
    pub log: PathBuf,

    /// Static asset root used for sizes when planning
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Size assumed for every asset when no root is given
    #[arg(long, default_value_t = DEFAULT_ASSET_SIZE)]
    pub asset_size: u64,

    /// Build a push plan for this primary path after replaying
    #[arg(long)]
    pub plan_for: Option<String>,

    /// Flow-control window for the plan, in bytes
    #[arg(long, default_value_t = 65_535, requires = "plan_for")]
    pub budget: u64,

    /// Client cache token sent with the planned request
    #[arg(long, requires = "plan_for")]
    pub token: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// One access log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub offset: Duration,
    pub session: String,
    pub path: String,
    pub leaf: bool,
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<LogEntry>, CliError> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }

    let error = |message: String| CliError::Log {
        line: line_no,
        message,
    };
    let fields: Vec<&str> = content.split_whitespace().collect();
    let (offset, session, path, kind) = match fields.as_slice() {
        [offset, session, path] => (*offset, *session, *path, None),
        [offset, session, path, kind] => (*offset, *session, *path, Some(*kind)),
        _ => {
            return Err(error(format!(
                "expected '<offset_ms> <session> <path> [leaf]', found {} fields",
                fields.len()
            )))
        }
    };

    let offset_ms: u64 = offset
        .parse()
        .map_err(|_| error(format!("invalid offset '{}'", offset)))?;
    let leaf = match kind {
        None => false,
        Some("leaf") => true,
        Some(other) => return Err(error(format!("unknown request kind '{}'", other))),
    };

    Ok(Some(LogEntry {
        offset: Duration::from_millis(offset_ms),
        session: session.to_string(),
        path: path.to_string(),
        leaf,
    }))
}

/// Parse a whole log, requiring non-decreasing offsets.
pub fn parse_log(contents: &str) -> Result<Vec<LogEntry>, CliError> {
    let mut entries = Vec::new();
    let mut last = Duration::ZERO;
    for (index, line) in contents.lines().enumerate() {
        if let Some(entry) = parse_line(line, index + 1)? {
            if entry.offset < last {
                return Err(CliError::Log {
                    line: index + 1,
                    message: "offsets must not decrease".to_string(),
                });
            }
            last = entry.offset;
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Sizes every asset the same. Stands in for an asset tree.
#[derive(Debug, Clone, Copy)]
pub struct UniformSizeLookup(pub u64);

impl SizeLookup for UniformSizeLookup {
    fn size_of<'a>(&'a self, _path: &'a str) -> BoxFuture<'a, Result<u64, SizeLookupError>> {
        let size = self.0;
        Box::pin(async move { Ok(size) })
    }
}

/// A plan request made after the log is replayed.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub primary: String,
    pub budget: u64,
    pub token: Option<String>,
}

/// Result of a replay.
#[derive(Debug)]
pub struct ReplayOutcome {
    pub learned: Vec<(String, RelatedPaths)>,
    pub stats: LearningStats,
    pub metrics: MetricsSnapshot,
    pub plan: Option<(PushPlan, String)>,
}

/// Replay `entries` through a fresh [`AutoPush`] on a virtual clock.
pub async fn replay(
    config: AutoPushConfig,
    sizes: Arc<dyn SizeLookup>,
    entries: &[LogEntry],
    plan_request: Option<PlanRequest>,
) -> Result<ReplayOutcome, CliError> {
    let clock = Arc::new(ManualScheduler::new());
    let warmup = config.learning.warmup_duration;
    let autopush = AutoPush::with_scheduler(config, sizes, clock.clone())?;

    let mut sessions: HashMap<&str, SessionId> = HashMap::new();
    for entry in entries {
        let fired = clock.advance_to(entry.offset);
        if fired > 0 {
            debug!(at_ms = entry.offset.as_millis() as u64, fired, "Evaluated warm-up windows");
        }
        let session = *sessions
            .entry(entry.session.as_str())
            .or_insert_with(|| autopush.open_session());
        autopush.record_request_path(session, &entry.path, entry.leaf);
    }

    clock.advance(warmup);
    for session in sessions.into_values() {
        autopush.close_session(session);
    }

    let plan = match plan_request {
        Some(request) => {
            let transport = MemoryTransport::new(Some(request.budget));
            let result = autopush
                .preprocess(&request.primary, request.token.as_deref(), &transport)
                .await;
            Some((result.push.plan().clone(), result.outgoing_token))
        }
        None => None,
    };

    let outcome = ReplayOutcome {
        learned: autopush.cache().learned_paths(),
        stats: autopush.cache().stats(),
        metrics: autopush.metrics().snapshot(),
        plan,
    };
    info!(
        requests = entries.len(),
        learned = outcome.stats.learned_paths,
        "Replay complete"
    );
    Ok(outcome)
}

/// Run the replay command.
pub fn run(args: ReplayArgs, config: AutoPushConfig) -> Result<(), CliError> {
    let entries = read_log(&args.log)?;
    let sizes: Arc<dyn SizeLookup> = match &args.root {
        Some(root) => Arc::new(FsSizeLookup::new(root)),
        None => Arc::new(UniformSizeLookup(args.asset_size)),
    };
    let plan_request = args.plan_for.map(|primary| PlanRequest {
        primary,
        budget: args.budget,
        token: args.token,
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Setup(e.to_string()))?;
    let outcome = runtime.block_on(replay(config, sizes, &entries, plan_request))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&outcome))?);
    } else {
        print_text(&outcome);
    }
    Ok(())
}

fn read_log(path: &Path) -> Result<Vec<LogEntry>, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_log(&contents)
}

fn to_json(outcome: &ReplayOutcome) -> serde_json::Value {
    let learned: serde_json::Map<String, serde_json::Value> = outcome
        .learned
        .iter()
        .map(|(path, assets)| (path.clone(), json!(assets)))
        .collect();
    let plan = outcome.plan.as_ref().map(|(plan, token)| {
        json!({
            "plan": plan,
            "outgoing_token": token,
        })
    });
    json!({
        "learned": learned,
        "stats": outcome.stats,
        "metrics": outcome.metrics,
        "plan": plan,
    })
}

fn print_text(outcome: &ReplayOutcome) {
    println!("Learned associations");
    println!("====================");
    if outcome.learned.is_empty() {
        println!("  (none)");
    }
    for (path, assets) in &outcome.learned {
        println!("{}", path);
        for asset in assets {
            println!("  -> {}", asset);
        }
    }
    println!();
    println!(
        "learned={} push_candidates={} warming={}",
        outcome.stats.learned_paths, outcome.stats.push_candidates, outcome.stats.warming_paths
    );
    println!("{}", outcome.metrics);

    if let Some((plan, token)) = &outcome.plan {
        println!();
        println!(
            "Push plan for {} ({} of {} bytes)",
            plan.primary, plan.total_bytes, plan.budget
        );
        if plan.is_empty() {
            println!("  (nothing to push)");
        }
        for asset in &plan.assets {
            println!("  {:>10}  {}", asset.size, asset.path);
        }
        println!("Outgoing token: {}", token);
    }
}
