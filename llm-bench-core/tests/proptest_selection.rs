//! Property-based tests for model selection using proptest.

use proptest::prelude::*;

use llm_bench_core::selector::{QuantPreference, is_model_file, select_index, select_model};
use llm_bench_core::{BenchError, RemoteFile};

fn quant_tag() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["f16", "q4_0", "Q4_K_M", "q5_1", "q8_0", "bf16"])
}

fn gguf_name() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9-]{0,10}", quant_tag()).prop_map(|(stem, tag)| format!("{stem}-{tag}.gguf"))
}

fn listing(names: &[String]) -> Vec<RemoteFile> {
    names
        .iter()
        .map(|n| RemoteFile {
            repo_id: "org/repo".into(),
            filename: n.clone(),
            size: None,
            url: format!("https://huggingface.co/org/repo/resolve/main/{n}"),
        })
        .collect()
}

// --- Selection heuristic properties ---

proptest! {
    #[test]
    fn first_marker_match_wins(names in prop::collection::vec(gguf_name(), 1..20)) {
        let pref = QuantPreference::default();
        let chosen = select_index(&names, &pref).unwrap();
        match names.iter().position(|n| n.to_lowercase().contains("q4")) {
            Some(first) => prop_assert_eq!(chosen, first),
            None => prop_assert_eq!(chosen, 0),
        }
    }

    #[test]
    fn chosen_file_carries_marker_when_any_does(names in prop::collection::vec(gguf_name(), 1..20)) {
        let pref = QuantPreference::default();
        let chosen = &names[select_index(&names, &pref).unwrap()];
        let any = names.iter().any(|n| n.to_lowercase().contains("q4"));
        prop_assert_eq!(chosen.to_lowercase().contains("q4"), any);
    }

    #[test]
    fn selection_ignores_case(names in prop::collection::vec(gguf_name(), 1..20)) {
        let upper: Vec<String> = names.iter().map(|n| n.to_uppercase()).collect();
        let pref = QuantPreference::new(["Q4"]);
        prop_assert_eq!(select_index(&names, &pref), select_index(&upper, &pref));
    }

    #[test]
    fn selection_is_deterministic(names in prop::collection::vec(gguf_name(), 0..20)) {
        let pref = QuantPreference::default();
        prop_assert_eq!(select_index(&names, &pref), select_index(&names, &pref));
    }

    #[test]
    fn non_model_files_never_selected(
        models in prop::collection::vec(gguf_name(), 1..10),
        others in prop::collection::vec("[a-z]{1,8}-q4\\.(json|md|bin)", 0..10),
    ) {
        let mut names = others;
        names.extend(models.iter().cloned());
        let chosen = select_model("org/repo", &listing(&names), &QuantPreference::default()).unwrap();
        prop_assert!(is_model_file(&chosen.filename));
        prop_assert!(models.contains(&chosen.filename));
    }

    #[test]
    fn listing_without_models_fails(others in prop::collection::vec("[a-z]{1,8}\\.(json|md|txt)", 0..10)) {
        let err = select_model("org/repo", &listing(&others), &QuantPreference::default()).unwrap_err();
        prop_assert!(
            matches!(err, BenchError::NoModelFiles { ref repo_id } if repo_id == "org/repo"),
            "unexpected error: {}",
            err
        );
    }
}

#[test]
fn test_reference_listings() {
    let pref = QuantPreference::default();
    let with_q4 = ["model-f16.gguf", "model-q4_0.gguf", "model-q8_0.gguf"];
    assert_eq!(select_index(&with_q4, &pref), Some(1));

    let without_q4 = ["model-f16.gguf", "model-q8_0.gguf"];
    assert_eq!(select_index(&without_q4, &pref), Some(0));

    let empty: [&str; 0] = [];
    assert_eq!(select_index(&empty, &pref), None);
}
