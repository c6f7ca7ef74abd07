use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use registry_tool::config::{self, ToolConfig};
use registry_tool::edit::{EditResult, FilePlan, Rewrite};
use registry_tool::github::GitHubClient;
use registry_tool::logging;
use registry_tool::policy::{self, StatusClass};
use registry_tool::safety::{RegistryLayout, REGISTRY_FILE};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "aqua-registry")]
#[command(about = "CLI to develop the aqua registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace or an EnvFilter directive)
    #[arg(long, global = true, env = "AQUA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Tool settings file (defaults to ./.aqua-registry.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry checkout root, the directory holding pkgs/
    #[arg(long, global = true, default_value = ".")]
    registry_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename a package: move pkgs/<old> to pkgs/<new> and patch both files
    Mv {
        /// Current package name, e.g. cli/cli
        old: String,
        /// New package name
        new: String,
    },

    /// Add checksum configs inferred from the latest release's assets
    PatchChecksum {
        /// registry.yaml to patch
        file: PathBuf,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Remove file_format and pattern so the default checksum parser is used
    #[command(alias = "prune-checksum")]
    ConvToDefaultChecksumParser {
        /// Registry files, or directories to search for them
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check whether a package's repository was transferred
    CheckRepo {
        /// Package name, e.g. cli/cli
        package: String,
    },

    /// Rebuild registry.yaml at the registry root from pkgs/**/registry.yaml
    #[command(alias = "gr")]
    GenerateRegistry {
        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Append `- import: <pkg file>` to a configuration file's packages
    Insert {
        /// Configuration file to edit
        config_file: PathBuf,
        /// Path to import
        pkg_file: String,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let cwd = env::current_dir().context("Failed to read the current directory")?;
    let settings = config::discover(cli.config.as_deref(), &cwd)?;

    // Mutations never await, so an interrupt lands between remote calls
    // and before any file is written.
    tokio::select! {
        result = run(cli, settings) => result,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
    }
}

async fn run(cli: Cli, settings: ToolConfig) -> Result<()> {
    let layout = RegistryLayout::new(&cli.registry_root);
    match cli.command {
        Commands::Mv { old, new } => cmd_mv(&layout, &old, &new),

        Commands::PatchChecksum {
            file,
            dry_run,
            diff,
        } => cmd_patch_checksum(&settings, &file, dry_run, diff).await,

        Commands::ConvToDefaultChecksumParser {
            paths,
            dry_run,
            diff,
        } => cmd_prune(&settings, &paths, dry_run, diff),

        Commands::CheckRepo { package } => cmd_check_repo(&settings, &layout, &package).await,

        Commands::GenerateRegistry { dry_run, diff } => cmd_generate(&layout, dry_run, diff),

        Commands::Insert {
            config_file,
            pkg_file,
            dry_run,
            diff,
        } => cmd_insert(&config_file, &pkg_file, dry_run, diff),
    }
}

fn cmd_mv(layout: &RegistryLayout, old: &str, new: &str) -> Result<()> {
    let report = policy::move_package(layout, old, new)
        .with_context(|| format!("Failed to move {old} to {new}"))?;
    println!("{} {} -> {}", "✓".green(), old, new.bold());
    println!(
        "  {}",
        format!("{}", report.registry_file.display()).dimmed()
    );
    if report.pkg_updated {
        println!("  {}", format!("{}", report.pkg_file.display()).dimmed());
    } else {
        println!(
            "  {}",
            format!("{} (no package name matched)", report.pkg_file.display()).yellow()
        );
    }
    Ok(())
}

async fn cmd_patch_checksum(
    settings: &ToolConfig,
    file: &Path,
    dry_run: bool,
    diff: bool,
) -> Result<()> {
    let client = GitHubClient::from_settings(&settings.github)?;
    let (report, plan) = policy::plan_checksum_patch(file, &client, &settings.checksum)
        .await
        .with_context(|| format!("Failed to patch {}", file.display()))?;

    finish(&plan, dry_run, diff)?;

    println!("{}", "Summary:".bold());
    println!("  {} patched", format!("{}", report.patched.len()).green());
    for name in &report.patched {
        println!("  - {}", name);
    }
    println!("  {} failed", format!("{}", report.failed.len()).red());
    for name in &report.failed {
        println!("  - {}", name.dimmed());
    }
    Ok(())
}

fn cmd_prune(settings: &ToolConfig, paths: &[PathBuf], dry_run: bool, diff: bool) -> Result<()> {
    let fields = &settings.prune.fields;
    let targets = policy::collect_targets(paths)?;
    let mut changed = 0;
    for path in &targets {
        let (removed, plan) = policy::plan_prune(path, fields)
            .with_context(|| format!("file_path: {}", path.display()))?;
        if finish(&plan, dry_run, diff)? {
            changed += 1;
            println!(
                "{} {}: removed {} field(s)",
                "✓".green(),
                path.display(),
                removed
            );
        }
    }

    println!("{}", "Summary:".bold());
    println!("  {} rewritten", format!("{}", changed).green());
    println!(
        "  {} unchanged",
        format!("{}", targets.len() - changed).yellow()
    );
    Ok(())
}

async fn cmd_check_repo(settings: &ToolConfig, layout: &RegistryLayout, package: &str) -> Result<()> {
    let client = GitHubClient::from_settings(&settings.github)?;
    let redirect = match policy::check_redirect(layout, &client, package).await {
        Ok(redirect) => redirect,
        Err(policy::PolicyError::HttpStatus { status, class }) => {
            tracing::error!(http_status_code = status, "check the repository");
            match class {
                StatusClass::Client => anyhow::bail!("http status code >= 400: {status}"),
                StatusClass::Server => anyhow::bail!("http status code >= 500: {status}"),
            }
        }
        Err(err) => return Err(err.into()),
    };
    let Some(redirect) = redirect else {
        return Ok(());
    };

    println!("{}", redirect.new_repository());
    tracing::error!(
        pkg_name = package,
        repo_owner = %redirect.new_repo_owner,
        repo_name = %redirect.new_repo_name,
        "a repository was transferred"
    );
    anyhow::bail!(
        "a repository was transferred: {} is now {}",
        package,
        redirect.new_package_name
    )
}

fn cmd_generate(layout: &RegistryLayout, dry_run: bool, diff: bool) -> Result<()> {
    let (count, plan) = policy::plan_generate(layout).context("Failed to generate registry.yaml")?;
    let target = layout.root().join(REGISTRY_FILE);
    if finish(&plan, dry_run, diff)? {
        println!("{} {}: {} package(s)", "✓".green(), target.display(), count);
    } else {
        println!("{} is up to date ({} package(s))", target.display(), count);
    }
    Ok(())
}

fn cmd_insert(config_file: &Path, pkg_file: &str, dry_run: bool, diff: bool) -> Result<()> {
    let plan = policy::plan_insert(config_file, pkg_file)
        .with_context(|| format!("Failed to update {}", config_file.display()))?;
    if finish(&plan, dry_run, diff)? {
        println!("{} {}: import {}", "✓".green(), config_file.display(), pkg_file);
    }
    Ok(())
}

/// Shows and applies a plan. Returns whether the file differs (or would).
fn finish(plan: &FilePlan, dry_run: bool, diff: bool) -> Result<bool> {
    let Some(rewrite) = plan.rewrite() else {
        if let FilePlan::NoOp(reason) = plan {
            tracing::debug!(reason = %reason, "nothing to write");
        }
        return Ok(false);
    };
    if diff || dry_run {
        display_diff(rewrite);
    }
    if dry_run {
        return Ok(true);
    }
    match rewrite.apply()? {
        EditResult::Applied { file, .. } => {
            tracing::info!(file_path = %file.display(), "write the file");
        }
        EditResult::AlreadyApplied { file } => {
            tracing::info!(file_path = %file.display(), "the file is already up to date");
        }
    }
    Ok(true)
}

/// Prints the planned change as hunks under a header naming the file and
/// the packages whose identifiers appear on changed lines.
fn display_diff(rewrite: &Rewrite) {
    let diff = TextDiff::from_lines(&rewrite.original, &rewrite.new_text);
    let (mut added, mut removed) = (0, 0);
    let mut packages = Vec::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => continue,
        }
        if let Some(name) = identity_on(change.value()) {
            if !packages.contains(&name) {
                packages.push(name);
            }
        }
    }

    println!(
        "\n{} {}",
        rewrite.file.display().to_string().bold(),
        format!("(+{added} -{removed})").dimmed()
    );
    if !packages.is_empty() {
        println!("{}", format!("packages: {}", packages.join(", ")).dimmed());
    }
    let mut unified = diff.unified_diff();
    unified.context_radius(2);
    for hunk in unified.iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red(),
                ChangeTag::Insert => format!("+{change}").green(),
                ChangeTag::Equal => format!(" {change}").normal(),
            };
            print!("{line}");
            if change.missing_newline() {
                println!();
            }
        }
    }
}

/// The package identifier a `name:` or `- name:` line sets, if any.
fn identity_on(line: &str) -> Option<String> {
    let rest = line.trim_start().trim_start_matches("- ").strip_prefix("name:")?;
    let value = rest.split(" #").next().unwrap_or_default().trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then(|| value.to_string())
}
