//! End-to-end behaviour of the annotation engine with a scripted model.

use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use time::macros::datetime;
use vellum::annotator::{DocumentAnnotator, untag};
use vellum::batch::{CancellationFlag, ExclusionMatcher};
use vellum::frontmatter::{detect, insert, strip};
use vellum::models::{AnnotationConfig, AnnotationOutcome, Document, SkipReason, StripOutcome};
use vellum::ollama::{OllamaClientTrait, OllamaError};
use vellum::store::{MemoryStore, TaggedFileStore};
use vellum::vault::MemoryVault;

fn fixed_clock() -> OffsetDateTime {
    datetime!(2025-01-02 03:04:05.678 UTC)
}

/// Returns a canned response and remembers every prompt it was given.
struct MockOllamaClient {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl MockOllamaClient {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl OllamaClientTrait for MockOllamaClient {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, OllamaError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

fn vocabulary(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

fn scenario_one_annotator(client: Arc<MockOllamaClient>) -> DocumentAnnotator {
    let config = AnnotationConfig::new("gemma3:4b", vocabulary(&["work", "personal"]))
        .with_tag_bounds(1, 2);
    DocumentAnnotator::new(client, config).with_clock(fixed_clock)
}

const SCENARIO_ONE_RESPONSE: &str = "Summary: Greeting.\nSuggested tags: work, personal, extra";

const SCENARIO_ONE_OUTPUT: &str = "---\ntags: [work, personal]\nLLM-tagged: 2025-01-02T03:04:05.678Z\nLLM-summary: \"Greeting.\"\n---\n\n# Hello";

#[test]
fn scenario_one_annotates_plain_document() {
    let vault = MemoryVault::new();
    vault.insert("hello.md", "# Hello", 1);
    let client = MockOllamaClient::new(SCENARIO_ONE_RESPONSE);

    let outcome = scenario_one_annotator(client.clone())
        .annotate(&vault, &mut MemoryStore::new(), "hello.md", &CancellationFlag::new())
        .unwrap();

    assert!(outcome.is_annotated());
    assert_eq!(vault.content("hello.md").unwrap(), SCENARIO_ONE_OUTPUT);
    assert!(client.prompts.lock().unwrap()[0].contains("Content to analyze:\n# Hello"));
}

#[test]
fn scenario_two_rerun_is_a_no_op() {
    let vault = MemoryVault::new();
    vault.insert("hello.md", SCENARIO_ONE_OUTPUT, 1);
    let client = MockOllamaClient::new(SCENARIO_ONE_RESPONSE);

    let outcome = scenario_one_annotator(client.clone())
        .annotate(&vault, &mut MemoryStore::new(), "hello.md", &CancellationFlag::new())
        .unwrap();

    assert_eq!(outcome, AnnotationOutcome::Skipped(SkipReason::AlreadyTagged));
    assert_eq!(vault.content("hello.md").unwrap(), SCENARIO_ONE_OUTPUT);
    assert_eq!(client.calls(), 0);
    assert_eq!(vault.write_count(), 0);
}

#[test]
fn scenario_three_strip_restores_original() {
    assert_eq!(strip(SCENARIO_ONE_OUTPUT), "# Hello");

    let vault = MemoryVault::new();
    vault.insert("hello.md", SCENARIO_ONE_OUTPUT, 1);
    let mut ledger = MemoryStore::new();
    ledger.mark_tagged("hello.md", 1);

    assert_eq!(untag(&vault, &mut ledger, "hello.md").unwrap(), StripOutcome::Stripped);
    assert_eq!(vault.content("hello.md").unwrap(), "# Hello");
    assert_eq!(ledger.last_tagged("hello.md"), None);
}

#[test]
fn scenario_four_genre_gets_an_extra_slot() {
    let vault = MemoryVault::new();
    vault.insert("poem.md", "Roses are red.", 1);
    let client = MockOllamaClient::new("Suggested tags: poesia, work, personal, other_invalid");
    let config = AnnotationConfig::new("m", vocabulary(&["work", "personal"]))
        .with_tag_bounds(1, 3)
        .with_genre_detection(true);

    let outcome = DocumentAnnotator::new(client, config)
        .annotate(&vault, &mut MemoryStore::new(), "poem.md", &CancellationFlag::new())
        .unwrap();

    let AnnotationOutcome::Annotated { tags, .. } = outcome else {
        panic!("expected annotation, got {outcome:?}");
    };
    assert_eq!(tags, vec!["poesia", "work", "personal"]);
    assert!(vault
        .content("poem.md")
        .unwrap()
        .starts_with("---\ntags: [poesia, work, personal]\n"));
}

#[test]
fn strip_undoes_insert_for_documents_without_user_tags() {
    let tags = vocabulary(&["a", "b"]);
    let documents = [
        "# Hello",
        "",
        "\nStarts with a blank line",
        "---\ntitle: Trip\n---\nBody",
        "---\ntitle: Trip\naliases:\n  - one\n  - two\n---\n\nBody\n---\nnot a block\n",
        "---\ncreated: 2024-01-01\n---",
        "No block here\n---\nstill body",
    ];

    for original in documents {
        let annotated = insert(original, &tags, "Say \"hi\"\nand bye", fixed_clock());
        assert!(detect(&annotated), "not detected after insert: {original:?}");
        assert_eq!(strip(&annotated), original, "round trip failed for {original:?}");
    }
}

#[test]
fn insert_replaces_previous_annotation_and_keeps_other_keys() {
    let first = insert(
        "---\ntitle: Trip\n---\nBody",
        &vocabulary(&["travel"]),
        "Old",
        datetime!(2024-01-01 00:00:00 UTC),
    );
    let second = insert(&first, &vocabulary(&["work"]), "New", fixed_clock());

    assert_eq!(
        second,
        "---\ntags: [work]\nLLM-tagged: 2025-01-02T03:04:05.678Z\nLLM-summary: \"New\"\ntitle: Trip\n---\nBody"
    );
}

struct EditingClient {
    vault: Arc<MemoryVault>,
}

impl OllamaClientTrait for EditingClient {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, OllamaError> {
        self.vault.insert("hello.md", "# Hello\n\nTyped while waiting.", 2);
        Ok(SCENARIO_ONE_RESPONSE.to_string())
    }
}

#[test]
fn edit_during_model_call_is_never_overwritten() {
    let vault = Arc::new(MemoryVault::new());
    vault.insert("hello.md", "# Hello", 1);
    let config = AnnotationConfig::new("m", vocabulary(&["work", "personal"]));
    let annotator = DocumentAnnotator::new(
        Arc::new(EditingClient {
            vault: vault.clone(),
        }),
        config,
    );
    let mut ledger = MemoryStore::new();

    let outcome = annotator
        .annotate(vault.as_ref(), &mut ledger, "hello.md", &CancellationFlag::new())
        .unwrap();

    assert_eq!(outcome, AnnotationOutcome::Skipped(SkipReason::ContentChanged));
    assert_eq!(vault.content("hello.md").unwrap(), "# Hello\n\nTyped while waiting.");
    assert_eq!(vault.write_count(), 0);
    assert!(ledger.is_empty());
}

#[test]
fn templates_pattern_excludes_folder_at_any_depth() {
    let matcher = ExclusionMatcher::new(&["templates/*".to_string()]).unwrap();

    assert!(matcher.is_excluded(&Document::new("templates/a.md", 0)));
    assert!(matcher.is_excluded(&Document::new("notes/templates/b.md", 0)));
    assert!(!matcher.is_excluded(&Document::new("my-templates-folder/c.md", 0)));
}
