use anchor_patcher::config::{discover_catalogs, load_from_path};
use anchor_patcher::driver::{check_distinct, run_batch, RunMode};
use anchor_patcher::engine::{PatchSet, RuleOutcome};
use anchor_patcher::report::{BatchReport, DocumentReport, DocumentStatus, Summary, Verification};
use anchor_patcher::safety::SiteGuard;
use anchor_patcher::AnchorError;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anchor-patcher")]
#[command(about = "Idempotent anchor-based document patching", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct TargetArgs {
    /// Site root containing the documents (default: $ANCHOR_PATCHER_ROOT or cwd)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Catalog file or directory (default: <root>/patches, then ./patches)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Override the fingerprint length used for idempotence checks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    fingerprint_len: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply catalog patches to documents
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Print the full report as JSON
        #[arg(long, conflicts_with = "diff")]
        json: bool,
    },

    /// Show which rules are applied, pending, or blocked
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Check every rule's fingerprint occurs exactly once
    Verify {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List catalogs, documents and rules
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply {
            target,
            dry_run,
            diff,
            json,
        } => cmd_apply(target, dry_run, diff, json),
        Commands::Status { target } => cmd_status(target),
        Commands::Verify { target } => cmd_verify(target),
        Commands::List { target } => cmd_list(target),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// A loaded and compiled catalog.
struct LoadedCatalog {
    name: String,
    path: PathBuf,
    sets: Vec<PatchSet>,
}

/// Machine-readable `apply --json` output.
#[derive(Serialize)]
struct ApplyOutput<'a> {
    root: String,
    dry_run: bool,
    catalogs: &'a [BatchReport],
    summary: &'a Summary,
}

/// Resolved root plus every catalog, compiled before any document is touched.
struct Session {
    guard: SiteGuard,
    catalogs: Vec<LoadedCatalog>,
}

/// Resolve the site root.
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. ANCHOR_PATCHER_ROOT environment variable
/// 3. Current directory
fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return path
            .canonicalize()
            .with_context(|| format!("site root not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("ANCHOR_PATCHER_ROOT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: ANCHOR_PATCHER_ROOT is set but path doesn't exist: {env_path}")
                .yellow()
        );
    }

    Ok(env::current_dir()?)
}

fn open_session(target: TargetArgs) -> Result<Session> {
    let root = resolve_root(target.root)?;
    let guard = SiteGuard::new(&root)?;

    let candidates = match target.catalog {
        Some(path) => vec![path],
        None => {
            let mut dirs = vec![root.join("patches")];
            if let Ok(cwd) = env::current_dir() {
                dirs.push(cwd.join("patches"));
            }
            dirs
        }
    };
    let files = discover_catalogs(&candidates)?;

    let fingerprint_len = target.fingerprint_len.map(|n| n as usize);
    let mut catalogs = Vec::with_capacity(files.len());
    for path in files {
        let catalog = load_from_path(&path)?;
        let sets = catalog
            .compile(fingerprint_len)
            .with_context(|| format!("catalog {} has malformed rules", path.display()))?;
        let name = if catalog.meta.name.is_empty() {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            catalog.meta.name.clone()
        };
        catalogs.push(LoadedCatalog { name, path, sets });
    }

    check_distinct(catalogs.iter().flat_map(|c| &c.sets), &guard)
        .context("a document may appear in only one catalog entry per run")?;

    Ok(Session { guard, catalogs })
}

impl Session {
    fn run(&self, mode: RunMode) -> Vec<BatchReport> {
        self.catalogs
            .iter()
            .map(|catalog| run_batch(&catalog.name, &catalog.sets, &self.guard, mode))
            .collect()
    }
}

fn status_label(status: DocumentStatus) -> colored::ColoredString {
    match status {
        DocumentStatus::Patched => "✓ patched".green(),
        DocumentStatus::Unchanged => "⊙ unchanged".yellow(),
        DocumentStatus::Skipped => "⊘ skipped".cyan(),
        DocumentStatus::Failed => "✗ failed".red(),
    }
}

fn print_skip_detail(err: &AnchorError) {
    eprintln!("      {}", err.to_string().red());
    if let AnchorError::NotFound {
        suggestion: Some(line),
        ..
    } = err
    {
        eprintln!("      closest line: {}", line.dimmed());
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
}

fn print_document(doc: &DocumentReport, dry_run: bool) {
    println!("{}: {}", status_label(doc.status), doc.file.display());

    if let Some(error) = &doc.error {
        eprintln!("    {}", error.red());
        return;
    }

    if let Some(outcome) = &doc.companion {
        match outcome {
            RuleOutcome::Applied { .. } => println!("    + companion link"),
            RuleOutcome::AlreadyApplied => {}
            RuleOutcome::Skipped(err) => {
                eprintln!("    {} companion link", "⊘".cyan());
                print_skip_detail(err);
            }
        }
    }

    for rule in &doc.rules {
        match &rule.outcome {
            RuleOutcome::Applied { offset, bytes } => {
                let verb = if dry_run { "would insert" } else { "inserted" };
                println!("    + {}: {verb} {bytes} bytes at {offset}", rule.id);
            }
            RuleOutcome::AlreadyApplied => {
                println!("    {} {}: already applied", "⊙".yellow(), rule.id);
            }
            RuleOutcome::Skipped(err) => {
                eprintln!("    {} {}: anchor not found", "⊘".cyan(), rule.id);
                print_skip_detail(err);
            }
        }
    }
}

fn print_summary(summary: &Summary, dry_run: bool) {
    println!("{}", "Summary:".bold());
    println!("  {} patched", format!("{}", summary.patched).green());
    println!("  {} unchanged", format!("{}", summary.unchanged).yellow());
    println!("  {} skipped", format!("{}", summary.skipped).cyan());
    println!("  {} failed", format!("{}", summary.failed).red());
    if dry_run {
        println!("  {} documents would be touched", summary.patched);
    } else {
        println!("  {} documents touched", summary.touched);
    }
}

fn cmd_apply(target: TargetArgs, dry_run: bool, show_diff: bool, json: bool) -> Result<()> {
    let session = open_session(target)?;
    let mode = if dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };
    let reports = session.run(mode);

    let mut summary = Summary::default();
    for report in &reports {
        summary.merge(&report.summary());
    }

    if json {
        let output = ApplyOutput {
            root: session.guard.root().display().to_string(),
            dry_run,
            catalogs: &reports,
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Site root: {}", session.guard.root().display());
        if dry_run {
            println!("{}", "[DRY RUN - no files will be written]".cyan());
        }
        println!();

        for (catalog, report) in session.catalogs.iter().zip(&reports) {
            println!("Catalog {} ({})", catalog.name.bold(), catalog.path.display());
            for doc in &report.documents {
                print_document(doc, dry_run);
                if show_diff && doc.status == DocumentStatus::Patched {
                    if let (Some(before), Some(after)) = (&doc.before, &doc.after) {
                        display_diff(&doc.file, before, after);
                    }
                }
            }
            println!();
        }

        print_summary(&summary, dry_run);
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(target: TargetArgs) -> Result<()> {
    let session = open_session(target)?;
    let reports = session.run(RunMode::DryRun);

    println!("{}", "Patch Status Report".bold());
    println!("Site root: {}", session.guard.root().display());
    println!();

    let mut applied = 0;
    let mut pending = 0;
    let mut blocked = 0;

    for report in &reports {
        for doc in &report.documents {
            println!("{}", doc.file.display().to_string().bold());
            if let Some(error) = &doc.error {
                println!("  {} {}", "✗".red(), error.red());
                continue;
            }
            match &doc.companion {
                Some(RuleOutcome::AlreadyApplied) => {
                    println!("  {} companion link", "✓".green());
                    applied += 1;
                }
                Some(RuleOutcome::Applied { .. }) => {
                    println!("  {} companion link (pending)", "⊙".yellow());
                    pending += 1;
                }
                Some(RuleOutcome::Skipped(err)) => {
                    println!(
                        "  {} companion link ({})",
                        "⊘".cyan(),
                        err.to_string().dimmed()
                    );
                    blocked += 1;
                }
                None => {}
            }
            for rule in &doc.rules {
                match &rule.outcome {
                    RuleOutcome::AlreadyApplied => {
                        println!("  {} {}", "✓".green(), rule.id);
                        applied += 1;
                    }
                    RuleOutcome::Applied { .. } => {
                        println!("  {} {} (pending)", "⊙".yellow(), rule.id);
                        pending += 1;
                    }
                    RuleOutcome::Skipped(err) => {
                        println!("  {} {} ({})", "⊘".cyan(), rule.id, err.to_string().dimmed());
                        blocked += 1;
                    }
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{applied}").green());
    println!("  {} pending", format!("{pending}").yellow());
    println!("  {} anchor missing", format!("{blocked}").cyan());

    Ok(())
}

fn cmd_verify(target: TargetArgs) -> Result<()> {
    let session = open_session(target)?;
    let reports = session.run(RunMode::DryRun);

    println!("{}", "Verifying patches...".bold());
    println!("Site root: {}", session.guard.root().display());
    println!();

    let mut verified = 0;
    let mut mismatch = 0;

    for report in &reports {
        for doc in &report.documents {
            if let Some(error) = &doc.error {
                eprintln!("{} {}: {}", "✗".red(), doc.file.display(), error);
                mismatch += 1;
                continue;
            }
            if let Some(outcome) = &doc.companion {
                if !matches!(outcome, RuleOutcome::AlreadyApplied) {
                    eprintln!("{} {}: companion link missing", "✗".red(), doc.file.display());
                    mismatch += 1;
                }
            }
            for rule in &doc.rules {
                match rule.verification() {
                    Verification::Verified => {
                        println!("{} {}#{}: verified", "✓".green(), doc.file.display(), rule.id);
                        verified += 1;
                    }
                    other => {
                        eprintln!(
                            "{} {}#{}: MISMATCH ({other})",
                            "✗".red(),
                            doc.file.display(),
                            rule.id
                        );
                        eprintln!("  Fingerprint: {}", rule.fingerprint);
                        mismatch += 1;
                    }
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{verified}").green());
    println!("  {} mismatch", format!("{mismatch}").red());

    if mismatch > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(target: TargetArgs) -> Result<()> {
    let session = open_session(target)?;

    for catalog in &session.catalogs {
        println!("{} ({})", catalog.name.bold(), catalog.path.display());
        for set in &catalog.sets {
            println!("  {}", set.file.display());
            if let Some(link) = &set.companion {
                println!("    companion: {}", link.resource.dimmed());
            }
            for rule in &set.rules {
                println!(
                    "    - {} [{}] {} {}",
                    rule.id,
                    rule.placement,
                    rule.anchor,
                    format!("fingerprint {}", rule.fingerprint()).dimmed()
                );
            }
        }
    }

    Ok(())
}
