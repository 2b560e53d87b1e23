/// Integration tests against a live Ollama server.
///
/// These tests require a running Ollama instance. They are automatically
/// skipped in GitHub Actions CI, and when no server answers at the default URL.
///
/// To run locally (with Ollama running):
/// ```bash
/// cargo test --test ollama_integration
/// ```
use std::sync::Arc;

use vellum::annotator::{DocumentAnnotator, build_prompt, parse_response};
use vellum::batch::CancellationFlag;
use vellum::models::{AnnotationConfig, AnnotationOutcome};
use vellum::ollama::{OllamaClient, OllamaClientBuilder, OllamaClientTrait};
use vellum::store::MemoryStore;
use vellum::vault::MemoryVault;

/// Skip test if running in GitHub Actions
fn skip_in_ci() -> bool {
    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        println!("Skipping test in GitHub Actions (no Ollama available)");
        return true;
    }
    false
}

/// Installed models, or `None` when no server answers.
fn reachable_models(client: &OllamaClient) -> Option<Vec<String>> {
    match client.list_models() {
        Ok(models) => Some(models),
        Err(e) => {
            println!("Skipping test: no Ollama server at {} ({})", client.base_url(), e);
            None
        }
    }
}

/// Model from `OLLAMA_MODEL`, or the first one the server reports.
fn pick_model(client: &OllamaClient) -> Option<String> {
    let models = reachable_models(client)?;
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        return Some(model);
    }
    let model = models.into_iter().next();
    if model.is_none() {
        println!("Skipping test: OLLAMA_MODEL not set and the server has no models installed");
    }
    model
}

#[test]
fn list_models_with_real_ollama_instance() {
    if skip_in_ci() {
        return;
    }

    let client = OllamaClientBuilder::new()
        .build()
        .expect("Failed to create Ollama client");

    let Some(models) = reachable_models(&client) else {
        return;
    };
    println!("Available models: {:?}", models);
    assert!(models.iter().all(|m| !m.is_empty()));
}

#[test]
fn annotate_with_real_ollama_instance() {
    if skip_in_ci() {
        return;
    }

    let client = OllamaClientBuilder::new()
        .build()
        .expect("Failed to create Ollama client");
    let Some(model) = pick_model(&client) else {
        return;
    };
    println!("Testing annotation with model: {}", model);

    let vocabulary: Vec<String> = ["programming", "cooking", "travel", "music"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    let config = AnnotationConfig::new(model.as_str(), vocabulary.clone()).with_tag_bounds(1, 2);

    let prompt = build_prompt(
        &config,
        &vocabulary,
        "Learning async Rust. The tokio runtime makes concurrent programming easier.",
    );
    let raw = client
        .generate(&model, &prompt)
        .unwrap_or_else(|e| panic!("Failed to generate with model '{}': {}", model, e));
    let parsed = parse_response(&raw, &vocabulary, &config);
    println!("Raw response: {}", raw);

    assert!(parsed.tags.len() <= 2);
    assert!(parsed.tags.iter().all(|t| vocabulary.contains(t)));

    let vault = MemoryVault::new();
    vault.insert("rust.md", "# Async Rust\n\nNotes on tokio and futures.", 1);
    let annotator = DocumentAnnotator::new(Arc::new(client), config);
    let outcome = annotator
        .annotate(&vault, &mut MemoryStore::new(), "rust.md", &CancellationFlag::new())
        .expect("Annotation failed");

    if let AnnotationOutcome::Annotated { .. } = outcome {
        assert!(vault.content("rust.md").unwrap().starts_with("---\ntags: ["));
    }
}

/// The client reports an unreachable server as an error instead of panicking.
#[test]
fn generate_handles_missing_ollama_gracefully() {
    if skip_in_ci() {
        return;
    }

    let client = OllamaClientBuilder::new()
        .base_url("http://127.0.0.1:65535")
        .retry_policy(vellum::ollama::RetryPolicy::none())
        .build()
        .expect("Failed to create Ollama client");

    let result = client.generate("test-model", "test prompt");

    assert!(result.is_err());
    let error_msg = format!("{}", result.unwrap_err());
    assert!(
        error_msg.contains("Network error") || error_msg.contains("Request timed out"),
        "Expected network/timeout error, got: {}",
        error_msg
    );
}
