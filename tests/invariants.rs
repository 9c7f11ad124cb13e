//! Contract Invariant Tests
//!
//! These tests verify the guarantees callers rely on.

mod common;

use common::{ScriptedModel, SelectingHost};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

use concierge_core::{
    extract_first_url, recover_json,
    verifier::{Discrepancy, DiscrepancySeverity},
    BrandGuidelines, CallOptions, CapabilityContext, DesignSpecification, GenerationRequest,
    Generator, Operation, Recovered, UsageLedger, VerificationResult,
};

fn sample_values() -> Vec<Value> {
    vec![
        json!({}),
        json!([]),
        json!({"colors": ["#FF0000", "#00FF00"], "nested": {"a": [1, 2, {"b": null}]}}),
        json!([{"a": 1}, {"b": "text with } and ] inside"}]),
        json!({"html": "<div class=\"x\">line\nbreak</div>", "n": 1.5, "ok": true}),
        json!({"unicode": "café ☕", "empty": ""}),
    ]
}

#[test]
fn invariant_recovery_is_idempotent_through_fences() {
    for v in sample_values() {
        let fenced = format!("```json\n{}\n```", serde_json::to_string(&v).unwrap());
        assert_eq!(recover_json(&fenced), Recovered::Value(v.clone()), "value {}", v);

        let pretty = format!("Sure:\n```json\n{}\n```\nDone.", serde_json::to_string_pretty(&v).unwrap());
        assert_eq!(recover_json(&pretty).into_value(), v);
    }
}

#[test]
fn invariant_recovery_never_panics() {
    let inputs = [
        "",
        " ",
        "pure prose without any structure",
        "{\"truncated\": [1, 2",
        "[{\"a\": 1}, {\"b\":",
        "{\"text\": \"raw\nnewline\tand tab\"}",
        "}}}]]]{{{[[[",
        "```json\n```",
        "```",
        "null",
        "\u{0}\u{1}{\"a\":1}",
        "{\"a\": \"é\"} trailing é ] }",
        "[1, 2, 3] and then {\"a\": ",
    ];
    for input in inputs {
        match recover_json(input) {
            Recovered::Value(v) => assert!(v.is_object() || v.is_array(), "input {:?}", input),
            Recovered::Empty => {}
        }
    }
}

#[test]
fn scenario_prose_wrapped_fence() {
    let text = "Here is the data:\n```json\n{\"colors\":[\"#FF0000\"]}\n```\nHope this helps!";
    assert_eq!(recover_json(text).into_value(), json!({"colors": ["#FF0000"]}));
}

#[test]
fn scenario_array_with_raw_newline() {
    let text = "Sure! [{\"a\":1},\n{\"b\":2}] enjoy";
    assert_eq!(recover_json(text).into_value(), json!([{"a": 1}, {"b": 2}]));
}

#[test]
fn scenario_url_skips_review_site() {
    let text = "Check https://www.yelp.com/biz/joe, also https://joespizza.com/menu.";
    assert_eq!(extract_first_url(text).as_deref(), Some("https://joespizza.com/menu"));
}

#[test]
fn invariant_denylisted_only_url_is_rejected() {
    for url in [
        "https://www.facebook.com/joes",
        "https://m.yelp.com/biz/joes-pizza",
        "https://www.doordash.com/store/joes",
        "https://bit.ly/3xyz",
    ] {
        let text = format!("Their page: {}", url);
        assert_eq!(extract_first_url(&text), None, "{}", url);
    }
}

#[test]
fn invariant_first_non_denylisted_url_wins() {
    let text = "https://instagram.com/joes https://www.tripadvisor.com/x \
                https://joes.example/home https://www.facebook.com/joes https://later.example";
    assert_eq!(extract_first_url(text).as_deref(), Some("https://joes.example/home"));
}

fn assert_dense(spec: &DesignSpecification) {
    let orders: Vec<u32> = spec.sections().iter().map(|s| s.order).collect();
    let expected: Vec<u32> = (1..=orders.len() as u32).collect();
    assert_eq!(orders, expected);
}

#[test]
fn invariant_section_order_stays_dense() {
    let mut spec = DesignSpecification::from_brand_guidelines(&BrandGuidelines::fallback());
    // Deterministic pseudo-random edit sequence.
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    for step in 0..500 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let len = spec.sections().len();
        let idx = if len == 0 { 0 } else { (seed >> 33) as usize % len };
        match (seed >> 20) % 4 {
            0 => spec.add_section(format!("custom-{}", step), vec![]),
            1 => {
                spec.move_section_up(idx);
            }
            2 => {
                spec.move_section_down(idx);
            }
            _ => {
                spec.remove_section(idx);
            }
        }
        assert_dense(&spec);
    }
}

#[test]
fn scenario_move_about_down() {
    let mut spec = DesignSpecification::from_brand_guidelines(&BrandGuidelines::fallback());
    spec.content.sections.retain(|s| ["hero", "about", "contact"].contains(&s.section_type.as_str()));
    spec.normalize_section_order();

    let about = spec.section_position("about").unwrap();
    assert!(spec.move_section_down(about));

    let got: Vec<_> = spec
        .sections()
        .iter()
        .map(|s| (s.section_type.as_str(), s.order))
        .collect();
    assert_eq!(got, vec![("hero", 1), ("contact", 2), ("about", 3)]);
}

fn verification(score: u8, discrepancies: Vec<Discrepancy>) -> VerificationResult {
    VerificationResult {
        overall_match_score: score,
        color_match_score: score,
        layout_match_score: score,
        typography_match_score: score,
        discrepancies,
        missing_assets: vec![],
        recommendations: vec![],
    }
}

#[test]
fn invariant_pass_gate_needs_score_and_no_discrepancies() {
    let minor = Discrepancy {
        element: "footer".into(),
        severity: DiscrepancySeverity::Minor,
        expected: "#FFFFFF".into(),
        actual: "#FAFAFA".into(),
    };
    assert!(!verification(90, vec![minor]).passed());
    assert!(verification(85, vec![]).passed());
    assert!(!verification(84, vec![]).passed());
}

#[tokio::test]
async fn scenario_capability_gate_then_skip_check() {
    let generator = Generator::new(ScriptedModel::new().reply("image ready"));
    let mut ledger = UsageLedger::new();
    let request = GenerationRequest::new("image-model", "draw a bakery homepage");

    let err = generator
        .call(
            Operation::GenerateConceptImage,
            &request,
            &mut ledger,
            CapabilityContext::default(),
            CallOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(err.is_capability_required());
    assert_eq!(generator.client().request_count(), 0);

    // Host selection resolved; retry once bypassing the predicate.
    let response = generator
        .call(
            Operation::GenerateConceptImage,
            &request,
            &mut ledger,
            CapabilityContext::default(),
            CallOptions { skip_check: true },
        )
        .await
        .unwrap();
    assert_eq!(response.text, "image ready");
    assert_eq!(ledger.count(Operation::GenerateConceptImage), 1);
}

#[tokio::test]
async fn invariant_selection_flow_retries_exactly_once() {
    let generator = Generator::new(ScriptedModel::new().fail(500, "boom"));
    let host = SelectingHost::unselected();
    let mut ledger = UsageLedger::new();
    let request = GenerationRequest::new("image-model", "draw");

    let err = generator
        .call_with_selection(Operation::GenerateConceptImage, &request, &mut ledger, &host)
        .await
        .unwrap_err();

    // The retry's transport failure propagates; no further attempts.
    assert!(!err.is_capability_required());
    assert!(err.to_string().contains("boom"));
    assert_eq!(host.prompts.load(Ordering::SeqCst), 1);
    assert_eq!(generator.client().request_count(), 1);
}

#[tokio::test]
async fn invariant_debit_on_dispatch_even_when_call_fails() {
    let generator = Generator::new(ScriptedModel::new().fail(503, "unavailable"));
    let mut ledger = UsageLedger::new();
    let request = GenerationRequest::new("m", "verify");

    assert!(generator
        .call_json(Operation::VerifyWebsite, &request, &mut ledger)
        .await
        .is_err());
    assert_eq!(ledger.count(Operation::VerifyWebsite), 1);
    assert_eq!(ledger.total_debited(), Operation::VerifyWebsite.credits() as u64);
}
