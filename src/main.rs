//! Readcheck CLI
//!
//! Usage:
//!   readcheck --serve                                # HTTP API over local collaborators
//!   readcheck --serve --content pages.json           # ... with page content loaded
//!   readcheck --source page.txt --text "summary"     # Offline gate check
//!   readcheck --source page.txt --text "..." --json  # JSON output

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use readcheck::core::feedback::{self, FeedbackCompiler};
use readcheck::core::{
    containment, run_server, tokenize, AppState, AssessmentOrchestrator, Collaborators, LexicalScorers,
    LexicalSearch, MemoryContentStore, MemoryPriorStore, Scorers, ScriptedGenerator,
};
use readcheck::types::AnalyticResult;
use readcheck::{Config, Error, Result, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "readcheck",
    version = VERSION,
    about = "Readcheck - Score reading summaries and coach students through what they missed",
    long_about = "Readcheck scores student summaries against the page they read.\n\n\
                  Cheap checks run first:\n  \
                  containment  - how much wording is copied from the source\n  \
                  language     - whether the summary is in the target language\n  \
                  profanity    - inappropriate words\n\n\
                  Summaries that pass are scored for content and wording; those\n\
                  that miss get a remediation question about the part they skipped.\n\n\
                  Modes:\n  \
                  --serve        HTTP API server mode\n  \
                  --source/--text  Offline gate check"
)]
struct Args {
    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (overrides the config file)
    #[arg(long, env = "READCHECK_ADDR")]
    addr: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "READCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file of pages served by the local content store
    #[arg(long)]
    content: Option<PathBuf>,

    /// Source text file for an offline gate check
    #[arg(long)]
    source: Option<PathBuf>,

    /// Summary text for an offline gate check
    #[arg(short, long)]
    text: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Log level when RUST_LOG is unset (overrides the config file)
    #[arg(long, env = "READCHECK_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(args.log_level.as_deref().unwrap_or(&config.server.log_level));

    let outcome = if args.serve {
        run_serve(&args, config).await
    } else if let (Some(source), Some(text)) = (&args.source, &args.text) {
        run_check(source, text, &args, &config).await
    } else {
        Err(Error::Validation(
            "nothing to do: pass --serve, or --source FILE with --text SUMMARY".into(),
        ))
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Run the HTTP service over the local collaborators
async fn run_serve(args: &Args, config: Config) -> Result<()> {
    let content = match &args.content {
        Some(path) => Arc::new(MemoryContentStore::from_json_file(path)?),
        None => Arc::new(MemoryContentStore::new()),
    };
    let collaborators = Collaborators {
        content: content.clone(),
        search: Arc::new(LexicalSearch::new(content)),
        scorers: Arc::new(LexicalScorers::new()),
        generator: Arc::new(ScriptedGenerator::default()),
        priors: Arc::new(MemoryPriorStore::new()),
    };

    let addr = args.addr.clone().unwrap_or_else(|| config.server.addr.clone());
    let orchestrator = AssessmentOrchestrator::new(&config, collaborators)?;
    let state = Arc::new(AppState::new(orchestrator, config.server.stream_log_timeout()));
    info!(version = VERSION, content = ?args.content, "starting readcheck");
    run_server(&addr, state).await
}

/// Gate sub-scores of an offline check
#[derive(Debug, Serialize)]
struct GateReport {
    passed: bool,
    results: Vec<AnalyticResult>,
}

/// Run the cheap gates against a source file, no services needed
async fn run_check(source: &Path, text: &str, args: &Args, config: &Config) -> Result<()> {
    let source_text = std::fs::read_to_string(source)?;
    if text.trim().is_empty() {
        return Err(Error::Validation("summary must not be empty".into()));
    }

    let compiler = FeedbackCompiler::new(config.feedback.rules.clone())?;
    let scorers = LexicalScorers::new();
    let (language, reliable) = scorers.detect_language(text).await?;
    let profane = scorers.contains_profanity(&tokenize(text)).await?;

    let results = vec![
        compiler.compile_with_threshold(
            feedback::CONTAINMENT,
            containment(&source_text, text),
            config.gating.containment_ceiling,
        )?,
        compiler.compile(feedback::LANGUAGE_ID, !reliable || language == config.gating.target_language)?,
        compiler.compile(feedback::PROFANITY, profane)?,
    ];
    let report = GateReport {
        passed: results.iter().all(|r| !r.is_failed()),
        results,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.no_color);
    }
    Ok(())
}

fn print_report(report: &GateReport, no_color: bool) {
    for result in &report.results {
        let score = result
            .raw_score
            .map(|s| format!("{:.4}", s.as_f64()))
            .unwrap_or_else(|| "-".to_string());
        let mark = match result.is_passed {
            Some(true) => "PASS",
            Some(false) => "FAIL",
            None => "SKIP",
        };
        let mark = if no_color {
            mark.normal()
        } else {
            match result.is_passed {
                Some(true) => mark.green().bold(),
                Some(false) => mark.red().bold(),
                None => mark.dimmed(),
            }
        };
        println!("{:<12} {:>8}  {}", result.name, score, mark);
        if let Some(message) = result.message.as_deref().filter(|m| !m.is_empty()) {
            if no_color {
                println!("             {}", message);
            } else {
                println!("             {}", message.dimmed());
            }
        }
    }

    println!();
    let verdict = if report.passed { "Gates passed" } else { "Gates failed" };
    if no_color {
        println!("{}", verdict);
    } else if report.passed {
        println!("{}", verdict.green().bold());
    } else {
        println!("{}", verdict.red().bold());
    }
}
