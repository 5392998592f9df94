use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detectors::discovery::Discovery;
use crate::detectors::module_format::PackageJsonProbe;
use crate::executor::batch::run_batch;
use crate::executor::run::Supervisor;
use crate::indexer::{dedupe, index_files};
use crate::isolate::Isolator;
use crate::lifecycle::{ArtifactTracker, ProcessHooks};
use crate::logger;
use crate::matcher::{direct_match, rank, title_filter};
use crate::state::{MatchResult, TestRecord};
use crate::ui::picker::{Choice, FirstChoice, Selection, Selector, TerminalPicker};
use crate::ui::report::Reporter;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(help = "Part of a test description to look for")]
    pub query: Option<String>,

    #[arg(long, short = 'd', default_value = ".", help = "Directory to search for test files")]
    pub dir: PathBuf,

    #[arg(long, short = 'a', default_value_t = false, help = "Run every matching test")]
    pub all: bool,

    #[arg(
        long,
        short = 'y',
        default_value_t = false,
        help = "Never prompt; run the best match"
    )]
    pub yes: bool,

    #[arg(long, short = 'l', default_value_t = false, help = "List matches without running them")]
    pub list: bool,

    #[arg(long, default_value_t = false, help = "With --list, print JSON")]
    pub json: bool,

    #[arg(long, help = "Runtime executable (default: node, or TT_RUNTIME)")]
    pub runtime: Option<String>,

    #[arg(long, help = "Fuzzy threshold 0.0-1.0; higher accepts looser matches")]
    pub threshold: Option<f64>,

    #[arg(long, default_value_t = false, help = "Disable colored output")]
    pub no_color: bool,
}

/// What the user picked from the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    All,
    One(usize),
}

/// Runs one invocation and returns the process exit code.
pub fn run(args: RunArgs) -> Result<i32, Box<dyn Error>> {
    let cfg = resolve_config(&args)?;
    debug!(target: logger::CLI, ?cfg, "configuration loaded");

    let tracker = ArtifactTracker::new();
    if let Err(e) = tracker.register_with(&ProcessHooks) {
        warn!(target: logger::CLI, "{e}");
    }
    let _cleanup = tracker.guard();

    let reporter = Reporter::from_config(&cfg);
    let interactive = !args.yes && TerminalPicker::available();

    if interactive {
        execute(&args, &cfg, &tracker, &reporter, &mut TerminalPicker)
    } else {
        execute(&args, &cfg, &tracker, &reporter, &mut FirstChoice)
    }
}

fn resolve_config(args: &RunArgs) -> Result<Config, Box<dyn Error>> {
    let mut cfg = Config::load(&args.dir)?;
    if let Some(runtime) = &args.runtime {
        cfg.runtime = runtime.clone();
    }
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold.clamp(0.0, 1.0);
    }
    if args.no_color {
        cfg.color = false;
    }
    Ok(cfg)
}

/// Everything after setup; the selector is injected so the flow can run
/// without a terminal.
pub fn execute<S: Selector>(
    args: &RunArgs,
    cfg: &Config,
    tracker: &ArtifactTracker,
    reporter: &Reporter,
    selector: &mut S,
) -> Result<i32, Box<dyn Error>> {
    let files = Discovery::from_config(cfg).find(&args.dir);
    if files.is_empty() {
        eprintln!("No test files found in {}", reporter.nice_path(&args.dir));
        return Ok(1);
    }

    let records = dedupe(index_files(&files, &cfg.callees, &PackageJsonProbe));
    info!(target: logger::CLI, files = files.len(), tests = records.len(), "index built");

    let query = args.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let candidates = match query {
        Some(q) => rank(&records, q, cfg.threshold),
        None => records.iter().cloned().map(unranked).collect(),
    };

    if candidates.is_empty() {
        match query {
            Some(q) => eprintln!("No tests found matching \"{q}\""),
            None => eprintln!("No tests found"),
        }
        return Ok(1);
    }

    if args.list {
        if args.json {
            println!("{}", reporter.listing_json(query, &candidates)?);
        } else {
            println!("{}", reporter.listing(&candidates));
        }
        return Ok(0);
    }

    let selected = match select(args, &candidates, reporter, selector)? {
        Some(records) => records,
        None => {
            info!(target: logger::CLI, "selection cancelled");
            return Ok(0);
        }
    };

    let isolator = Isolator::from_config(cfg);
    let supervisor = Supervisor::new(cfg.runtime.clone(), &isolator, tracker);
    let summary = run_batch(&supervisor, &selected, |record| {
        println!("{}", reporter.running(record));
    });

    if summary.entries.len() > 1 || summary.failures().next().is_some() || summary.fatal.is_some() {
        eprintln!("\n{}", reporter.summary(&summary));
    }

    Ok(summary.exit_code)
}

/// `None` means the user cancelled.
fn select<S: Selector>(
    args: &RunArgs,
    candidates: &[MatchResult],
    reporter: &Reporter,
    selector: &mut S,
) -> Result<Option<Vec<TestRecord>>, Box<dyn Error>> {
    let all = || candidates.iter().map(|m| m.record.clone()).collect::<Vec<_>>();

    if args.all {
        return Ok(Some(all()));
    }
    if let Some(m) = direct_match(candidates) {
        debug!(target: logger::CLI, description = %m.record.description, "exact match, skipping prompt");
        return Ok(Some(vec![m.record.clone()]));
    }

    let choices = choices(candidates, reporter);
    let picked = selector.select("Pick a test to run", &choices, &title_filter)?;

    Ok(match picked {
        Selection::Cancelled => None,
        Selection::Chosen(Pick::All) => Some(all()),
        Selection::Chosen(Pick::One(i)) => Some(vec![candidates[i].record.clone()]),
    })
}

pub fn choices(candidates: &[MatchResult], reporter: &Reporter) -> Vec<Choice<Pick>> {
    let mut out: Vec<Choice<Pick>> = candidates
        .iter()
        .enumerate()
        .map(|(i, m)| Choice {
            title: reporter.choice_title(&m.record),
            value: Pick::One(i),
        })
        .collect();

    // Last, so the best match stays the default.
    if candidates.len() > 1 {
        out.push(Choice {
            title: format!("Run all {} matching tests", candidates.len()),
            value: Pick::All,
        });
    }
    out
}

fn unranked(record: TestRecord) -> MatchResult {
    MatchResult {
        record,
        score: 0.0,
        is_exact_match: false,
        has_prefix_collision: false,
    }
}
