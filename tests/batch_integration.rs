//! Batch runs over a real directory, with the ledger stored in a settings file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use vellum::annotator::DocumentAnnotator;
use vellum::batch::{BatchController, ExclusionMatcher, in_folder};
use vellum::models::Settings;
use vellum::ollama::{OllamaClientTrait, OllamaError};
use vellum::store::{SettingsFile, TaggedFileStore};
use vellum::vault::{DocumentStore, FsVault};

struct CountingClient {
    calls: Mutex<usize>,
}

impl OllamaClientTrait for CountingClient {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, OllamaError> {
        *self.calls.lock().unwrap() += 1;
        if prompt.contains("recipe") {
            Ok("Summary: A recipe.\nSuggested tags: cooking".to_string())
        } else {
            Ok("Summary: Notes.\nSuggested tags: work, #cooking (maybe)".to_string())
        }
    }
}

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
}

fn read(root: &Path, path: &str) -> String {
    std::fs::read_to_string(root.join(path)).unwrap()
}

fn settings() -> Settings {
    Settings {
        selected_model: Some("gemma3:4b".to_string()),
        vocabulary: vec!["work".to_string(), "cooking".to_string()],
        exclude_patterns: vec!["templates/*".to_string()],
        min_tags: 1,
        max_tags: 2,
        ..Settings::default()
    }
}

#[test]
fn tag_then_untag_round_trips_a_vault() -> Result<()> {
    let vault_dir = tempfile::tempdir()?;
    let config_dir = tempfile::tempdir()?;
    let root = vault_dir.path();
    write(root, "inbox.md", "Meeting notes for Monday.");
    write(root, "kitchen/pasta.md", "---\nsource: grandma\n---\nA recipe for pasta.");
    write(root, "templates/daily.md", "Template body.");
    write(root, ".obsidian/workspace.md", "ignored");

    let settings_path = config_dir.path().join("settings.json");
    let mut file = SettingsFile::new(&settings_path, settings());
    let config = file.settings().annotation_config()?;
    let client = Arc::new(CountingClient {
        calls: Mutex::new(0),
    });
    let annotator = DocumentAnnotator::new(client.clone(), config);
    let controller = BatchController::new(ExclusionMatcher::new(&file.settings().exclude_patterns)?);
    let vault = FsVault::open(root)?;
    let documents = vault.list()?;
    assert_eq!(documents.len(), 3);

    let report = controller.run_annotate(&annotator, &vault, &mut file, &documents, |_| {});

    assert_eq!((report.modified, report.skipped, report.failed), (2, 1, 0));
    assert_eq!(*client.calls.lock().unwrap(), 2);
    let inbox = read(root, "inbox.md");
    assert!(inbox.starts_with("---\ntags: [work, cooking]\nLLM-tagged: "));
    assert!(inbox.ends_with("LLM-summary: \"Notes.\"\n---\n\nMeeting notes for Monday."));
    let pasta = read(root, "kitchen/pasta.md");
    assert!(pasta.contains("tags: [cooking]\n"));
    assert!(pasta.ends_with("source: grandma\n---\nA recipe for pasta."));
    assert_eq!(read(root, "templates/daily.md"), "Template body.");

    let reloaded = SettingsFile::load(&settings_path)?;
    assert!(reloaded.last_tagged("inbox.md").is_some());
    assert!(reloaded.last_tagged("kitchen/pasta.md").is_some());
    assert_eq!(reloaded.last_tagged("templates/daily.md"), None);

    // Nothing changed since tagging, so a second pass makes no model calls.
    let documents = vault.list()?;
    let again = controller.run_annotate(&annotator, &vault, &mut file, &documents, |_| {});
    assert_eq!((again.modified, again.skipped), (0, 3));
    assert_eq!(*client.calls.lock().unwrap(), 2);

    let stripped = controller.run_untag(&vault, &mut file, &documents, |_| {});
    assert_eq!((stripped.modified, stripped.skipped), (2, 1));
    assert_eq!(read(root, "inbox.md"), "Meeting notes for Monday.");
    assert_eq!(
        read(root, "kitchen/pasta.md"),
        "---\nsource: grandma\n---\nA recipe for pasta."
    );
    assert!(SettingsFile::load(&settings_path)?.settings().tagged_files.is_empty());

    Ok(())
}

#[test]
fn folder_scope_limits_the_batch() -> Result<()> {
    let vault_dir = tempfile::tempdir()?;
    let root = vault_dir.path();
    write(root, "top.md", "Top level note.");
    write(root, "kitchen/pasta.md", "A recipe.");
    write(root, "kitchen/old/soup.md", "Another recipe.");

    let config_dir = tempfile::tempdir()?;
    let mut file = SettingsFile::new(config_dir.path().join("settings.json"), settings());
    let annotator = DocumentAnnotator::new(
        Arc::new(CountingClient {
            calls: Mutex::new(0),
        }),
        file.settings().annotation_config()?,
    );
    let controller = BatchController::new(ExclusionMatcher::default());
    let vault = FsVault::open(root)?;
    let all = vault.list()?;
    let documents: Vec<_> = in_folder(&all, "kitchen").cloned().collect();

    let report = controller.run_annotate(&annotator, &vault, &mut file, &documents, |_| {});

    assert_eq!((report.total, report.modified), (1, 1));
    assert!(read(root, "kitchen/pasta.md").starts_with("---\n"));
    assert_eq!(read(root, "top.md"), "Top level note.");
    assert_eq!(read(root, "kitchen/old/soup.md"), "Another recipe.");
    Ok(())
}

#[test]
fn invalid_configuration_is_reported_before_any_work() {
    let settings = Settings {
        selected_model: Some("m".to_string()),
        vocabulary: vec!["work".to_string()],
        min_tags: 4,
        max_tags: 2,
        ..Settings::default()
    };
    let err = settings.annotation_config().unwrap_err();
    assert!(err.to_string().contains("min 4, max 2"));
}
