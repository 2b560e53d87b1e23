use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use vellum::annotator::{self, DocumentAnnotator};
use vellum::batch::{BatchController, BatchProgress, CancellationFlag, ExclusionMatcher, in_folder};
use vellum::models::{AnnotationOutcome, ConfigError, Document, Settings, SkipReason, StripOutcome};
use vellum::ollama::{OllamaClient, OllamaClientBuilder};
use vellum::queue::{ChangeDetector, TaskQueue};
use vellum::store::SettingsFile;
use vellum::utils::settings_path;
use vellum::vault::{DocumentStore, FsVault};

/// vellum - LLM-generated tags and summaries for markdown notes
#[derive(Parser)]
#[command(name = "vellum")]
#[command(about = "Annotate markdown notes with tags and summaries from a local Ollama model")]
#[command(version)]
struct Cli {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Vault directory holding the markdown notes
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Annotate every note in the vault (or one folder)
    Tag(ScopeCommand),
    /// Remove annotations from every note in the vault (or one folder)
    Untag(ScopeCommand),
    /// Annotate a single note
    TagFile(FileCommand),
    /// Remove the annotation from a single note
    UntagFile(FileCommand),
    /// List the models available on the Ollama server
    Models,
    /// Annotate notes as they are created or modified
    Watch(WatchCommand),
    /// Show or initialise the settings file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Parser)]
struct ScopeCommand {
    /// Only process notes directly inside this vault folder
    #[arg(long, value_name = "DIR")]
    folder: Option<String>,
}

#[derive(Parser)]
struct FileCommand {
    /// Path of the note, relative to the vault or the current directory
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

#[derive(Parser)]
struct WatchCommand {
    /// Seconds between vault scans
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    interval: u64,

    /// Quiet period in milliseconds before a changed note is annotated
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    debounce_ms: u64,

    /// Run even if `auto_tag` is disabled in the settings
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings as JSON
    Show,
    /// Write a settings file with default values
    Init,
}

/// A mistake in how the command was invoked.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Tag(cmd) => handle_tag(&cli, cmd),
        Commands::Untag(cmd) => handle_untag(&cli, cmd),
        Commands::TagFile(cmd) => handle_tag_file(&cli, cmd),
        Commands::UntagFile(cmd) => handle_untag_file(&cli, cmd),
        Commands::Models => handle_models(&cli),
        Commands::Watch(cmd) => handle_watch(&cli, cmd),
        Commands::Config(cmd) => handle_config(&cli, cmd),
    };

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are configuration and invocation mistakes; everything else
/// (I/O, the model service) is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some() || cause.downcast_ref::<UsageError>().is_some()
    })
}

fn load_settings(cli: &Cli) -> Result<SettingsFile> {
    let path = match &cli.settings {
        Some(path) => path.clone(),
        None => settings_path()?,
    };
    SettingsFile::load(path).context("Failed to load settings")
}

/// Settings with `OLLAMA_HOST` and `OLLAMA_MODEL` applied on top.
///
/// The overrides are never written back to the settings file.
fn effective_settings(file: &SettingsFile) -> Settings {
    let mut settings = file.settings().clone();
    if let Some(host) = non_empty_env("OLLAMA_HOST") {
        settings.ollama_url = host;
    }
    if let Some(model) = non_empty_env("OLLAMA_MODEL") {
        settings.selected_model = Some(model);
    }
    settings
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn open_vault(cli: &Cli) -> Result<FsVault> {
    let root = cli
        .vault
        .canonicalize()
        .with_context(|| format!("Vault directory not found: {}", cli.vault.display()))?;
    FsVault::open(root).context("Failed to open vault")
}

fn build_client(settings: &Settings) -> Result<OllamaClient> {
    OllamaClientBuilder::new()
        .base_url(&settings.ollama_url)
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("Failed to create Ollama client")
}

fn build_annotator(settings: &Settings) -> Result<DocumentAnnotator> {
    let config = settings.annotation_config()?;
    let client = build_client(settings)?;
    Ok(DocumentAnnotator::new(Arc::new(client), config))
}

fn build_controller(settings: &Settings) -> Result<BatchController> {
    Ok(BatchController::new(ExclusionMatcher::new(
        &settings.exclude_patterns,
    )?))
}

fn select_documents(vault: &FsVault, folder: Option<&str>) -> Result<Vec<Document>> {
    let documents = vault.list().context("Failed to list vault documents")?;
    Ok(match folder {
        Some(folder) => in_folder(&documents, folder).cloned().collect(),
        None => documents,
    })
}

/// Progress goes to stderr so stdout only carries results.
fn print_progress(progress: &BatchProgress<'_>) {
    eprintln!("{}", progress_line(progress));
}

fn progress_line(progress: &BatchProgress<'_>) -> String {
    match progress.error {
        Some(e) => format!(
            "[{}/{}] {}: {}",
            progress.processed,
            progress.total,
            progress.current,
            error_chain(e)
        ),
        None => format!(
            "[{}/{}] {}",
            progress.processed, progress.total, progress.current
        ),
    }
}

/// Joins an error and its sources into one line, like anyhow's `{:#}`.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    std::iter::successors(Some(error), |e| e.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

/// Handles the tag command by annotating the selected documents.
fn handle_tag(cli: &Cli, cmd: &ScopeCommand) -> Result<()> {
    let mut file = load_settings(cli)?;
    let settings = effective_settings(&file);
    let annotator = build_annotator(&settings)?;
    let controller = build_controller(&settings)?;
    let vault = open_vault(cli)?;
    let documents = select_documents(&vault, cmd.folder.as_deref())?;

    let report = controller.run_annotate(&annotator, &vault, &mut file, &documents, print_progress);
    println!("{report}");
    Ok(())
}

/// Handles the untag command by stripping annotations from the selected documents.
fn handle_untag(cli: &Cli, cmd: &ScopeCommand) -> Result<()> {
    let mut file = load_settings(cli)?;
    let controller = build_controller(&effective_settings(&file))?;
    let vault = open_vault(cli)?;
    let documents = select_documents(&vault, cmd.folder.as_deref())?;

    let report = controller.run_untag(&vault, &mut file, &documents, print_progress);
    println!("{report}");
    Ok(())
}

/// Resolves a user-supplied note path to a vault-relative path.
///
/// The path is tried relative to the vault first, then relative to the
/// current directory.
fn vault_relative_path(vault: &FsVault, input: &Path) -> Result<String> {
    let in_vault = vault.root().join(input);
    let candidate = if in_vault.is_file() {
        in_vault
    } else {
        input.to_path_buf()
    };
    let full = candidate
        .canonicalize()
        .with_context(|| format!("Note not found: {}", input.display()))?;

    vault.relative_path(&full).ok_or_else(|| {
        UsageError(format!(
            "{} is not inside the vault {}",
            input.display(),
            vault.root().display()
        ))
        .into()
    })
}

/// Handles the tag-file command for one document.
fn handle_tag_file(cli: &Cli, cmd: &FileCommand) -> Result<()> {
    let mut file = load_settings(cli)?;
    let settings = effective_settings(&file);
    let annotator = build_annotator(&settings)?;
    let vault = open_vault(cli)?;
    let path = vault_relative_path(&vault, &cmd.path)?;

    let outcome = annotator
        .annotate(&vault, &mut file, &path, &CancellationFlag::new())
        .with_context(|| format!("Failed to tag {path}"))?;

    match outcome {
        AnnotationOutcome::Annotated { tags, summary } => {
            println!("Tagged {path} with: {}", tags.join(", "));
            println!("Summary: {summary}");
        }
        AnnotationOutcome::Skipped(SkipReason::AlreadyTagged) => {
            println!("{path} is already tagged")
        }
        AnnotationOutcome::Skipped(SkipReason::ContentChanged) => {
            println!("{path} changed while tagging; skipped")
        }
        AnnotationOutcome::Skipped(SkipReason::NoTags | SkipReason::NoChange) => {
            println!("No tags added to {path}")
        }
        AnnotationOutcome::Skipped(reason) => println!("Skipped {path}: {reason}"),
    }
    Ok(())
}

/// Handles the untag-file command for one document.
fn handle_untag_file(cli: &Cli, cmd: &FileCommand) -> Result<()> {
    let mut file = load_settings(cli)?;
    let vault = open_vault(cli)?;
    let path = vault_relative_path(&vault, &cmd.path)?;

    match annotator::untag(&vault, &mut file, &path)
        .with_context(|| format!("Failed to untag {path}"))?
    {
        StripOutcome::Stripped => println!("Removed tags from {path}"),
        StripOutcome::NoOp => println!("{path} has no tags to remove"),
    }
    Ok(())
}

/// Handles the models command by listing what the server offers.
fn handle_models(cli: &Cli) -> Result<()> {
    let file = load_settings(cli)?;
    let settings = effective_settings(&file);
    let client = build_client(&settings)?;

    let models = client
        .list_models()
        .with_context(|| format!("Failed to list models from {}", client.base_url()))?;
    if models.is_empty() {
        println!("No models installed on {}", client.base_url());
    }
    for model in models {
        let marker = if settings.selected_model.as_deref() == Some(model.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {model}");
    }
    Ok(())
}

/// Handles the watch command: polls the vault and annotates changed notes.
fn handle_watch(cli: &Cli, cmd: &WatchCommand) -> Result<()> {
    let mut file = load_settings(cli)?;
    let settings = effective_settings(&file);
    if !settings.auto_tag && !cmd.force {
        return Err(UsageError(
            "auto_tag is disabled in the settings; enable it or pass --force".to_string(),
        )
        .into());
    }

    let annotator = build_annotator(&settings)?;
    let controller = build_controller(&settings)?;
    let vault = open_vault(cli)?;
    let mut queue = TaskQueue::new(Duration::from_millis(cmd.debounce_ms));
    let mut detector = ChangeDetector::new();

    println!("Watching {} (Ctrl-C to stop)", vault.root().display());
    loop {
        let documents = vault.list().context("Failed to list vault documents")?;
        let now = Instant::now();
        for path in detector.changes(&documents) {
            debug!(path, "change detected");
            queue.enqueue(&path, now);
        }

        while let Some(task) = queue.next_ready(Instant::now()) {
            match vault.stat(&task.path) {
                Ok(document) => {
                    match controller.annotate_document(&annotator, &vault, &mut file, &document) {
                        Ok(AnnotationOutcome::Annotated { tags, .. }) => {
                            println!("Tagged {} with: {}", task.path, tags.join(", "))
                        }
                        Ok(AnnotationOutcome::Skipped(_)) => {}
                        Err(e) => warn!(path = %task.path, error = %e, "auto-tagging failed"),
                    }
                }
                Err(e) => debug!(path = %task.path, error = %e, "document disappeared"),
            }
            queue.complete(&task.path);
        }

        thread::sleep(Duration::from_secs(cmd.interval.max(1)));
    }
}

/// Handles the config subcommands.
fn handle_config(cli: &Cli, cmd: &ConfigCommand) -> Result<()> {
    let file = load_settings(cli)?;
    match cmd {
        ConfigCommand::Show => {
            let json = serde_json::to_string_pretty(&effective_settings(&file))
                .context("Failed to serialize settings")?;
            println!("# {}", file.path().display());
            println!("{json}");
        }
        ConfigCommand::Init => {
            if file.exists() {
                return Err(UsageError(format!(
                    "Settings file already exists: {}",
                    file.path().display()
                ))
                .into());
            }
            file.save().context("Failed to write settings")?;
            println!("Wrote default settings to {}", file.path().display());
        }
    }
    Ok(())
}
