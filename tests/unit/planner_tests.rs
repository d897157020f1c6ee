/*!
 * Tests for batch planning over deduplicated documents
 */

use serde_json::json;

use doctrans::document::{FieldLocator, deduplicate};
use doctrans::progress::{ProgressSnapshot, TranslationRecord};
use doctrans::translation::{BatchPlanner, pending_texts};

fn languages(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|code| code.to_string()).collect()
}

/// Test that every batch stays under the ceiling unless it is a lone oversized text
#[test]
fn test_plan_withManyTexts_shouldRespectCeilingAndCoverEveryText() {
    let prose: Vec<String> = (0..200)
        .map(|i| format!("Paragraph {} {}", i, "lorem ipsum ".repeat(i % 40)))
        .collect();
    let document = json!({ "chapters": prose.iter().map(|text| json!({ "prose": text })).collect::<Vec<_>>() });

    let unique = deduplicate(FieldLocator::new(["prose"]).locate(&document));
    let targets = languages(&["fr", "es", "it"]);
    let pending = pending_texts(&unique, &ProgressSnapshot::new(), &targets);
    assert_eq!(pending.len(), 200);

    let planner = BatchPlanner::new(600, 100, 3);
    let batches = planner.plan(&pending);

    for batch in &batches {
        assert_eq!(batch.estimated_tokens, {
            let text_tokens: usize = batch.entries.iter().map(|entry| planner.estimate_text(&entry.text)).sum();
            text_tokens * batch.languages.len()
        });
        assert!(
            batch.estimated_tokens <= planner.usable_tokens() || batch.entries.len() == 1,
            "batch {} has {} entries and {} tokens",
            batch.index,
            batch.entries.len(),
            batch.estimated_tokens
        );
    }

    let mut planned: Vec<&str> = batches
        .iter()
        .flat_map(|batch| batch.entries.iter().map(|entry| entry.text.as_str()))
        .collect();
    planned.sort_unstable();
    let mut expected: Vec<&str> = prose.iter().map(String::as_str).collect();
    expected.sort_unstable();
    assert_eq!(planned, expected);

    let indexes: Vec<usize> = batches.iter().map(|batch| batch.index).collect();
    assert_eq!(indexes, (0..batches.len()).collect::<Vec<_>>());
}

/// Test that repeated strings cost one batch entry
#[test]
fn test_plan_withHundredIdenticalTexts_shouldPlanOneEntry() {
    let document = json!({ "rows": vec![json!({ "title": "OK" }); 100] });
    let unique = deduplicate(FieldLocator::new(["title"]).locate(&document));
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].locators.len(), 100);

    let pending = pending_texts(&unique, &ProgressSnapshot::new(), &languages(&["fr"]));
    let batches = BatchPlanner::new(4000, 200, 3).plan(&pending);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].entries.len(), 1);
    assert_eq!(batches[0].pair_count(), 1);
}

/// Test that a partially translated text only asks for what is missing
#[test]
fn test_plan_withPartialProgress_shouldRequestMissingLanguagesOnly() {
    let document = json!({ "title": "Hello", "prose": "World" });
    let unique = deduplicate(FieldLocator::new(["title", "prose"]).locate(&document));
    let hello = unique.iter().find(|text| text.text == "Hello").unwrap();
    let world = unique.iter().find(|text| text.text == "World").unwrap();

    let mut snapshot = ProgressSnapshot::new();
    snapshot.apply(&[
        TranslationRecord::translated(hello.id.clone(), "Hello", "fr", "Bonjour"),
        TranslationRecord::translated(hello.id.clone(), "Hello", "es", "Hola"),
        TranslationRecord::translated(world.id.clone(), "World", "fr", "Monde"),
        TranslationRecord::failed(world.id.clone(), "World", "es"),
    ]);

    let pending = pending_texts(&unique, &snapshot, &languages(&["fr", "es"]));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "World");
    assert_eq!(pending[0].languages, vec!["es"]);

    let batches = BatchPlanner::new(4000, 200, 3).plan(&pending);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].languages, vec!["es"]);
}
