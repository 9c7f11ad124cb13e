//! Conformance Verifier
//!
//! Scores built markup against a design specification. The comparison is
//! done by the model; this module builds the prompt, decodes the answer and
//! applies the pass/fail policy. An unreadable answer is `Unavailable`,
//! never a pass.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credits::{Operation, UsageLedger};
use crate::design::DesignSpecification;
use crate::generation::{GenerationError, Generator};
use crate::hashing::spec_fingerprint;
use crate::model::{GenerationRequest, InlineImage, ModelClient};
use crate::schema::ResponseSchema;

/// Minimum overall score for "no action required".
pub const PASS_THRESHOLD: u8 = 85;

/// Missing or null severities decode as `Major`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancySeverity {
    Critical,
    #[default]
    Major,
    Minor,
}

impl<'de> Deserialize<'de> for DiscrepancySeverity {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Null => return Ok(DiscrepancySeverity::default()),
            other => other.to_string(),
        };
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" => DiscrepancySeverity::Critical,
            "major" | "medium" => DiscrepancySeverity::Major,
            _ => DiscrepancySeverity::Minor,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub severity: DiscrepancySeverity,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAsset {
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub placement: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    #[serde(deserialize_with = "lenient_score")]
    pub overall_match_score: u8,
    #[serde(default, deserialize_with = "lenient_score")]
    pub color_match_score: u8,
    #[serde(default, deserialize_with = "lenient_score")]
    pub layout_match_score: u8,
    #[serde(default, deserialize_with = "lenient_score")]
    pub typography_match_score: u8,
    /// In the order the model returned them.
    #[serde(default)]
    pub discrepancies: Vec<Discrepancy>,
    #[serde(default)]
    pub missing_assets: Vec<MissingAsset>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Accepts integers, floats and numeric strings; clamps to 0..=100.
fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let v = Value::deserialize(d)?;
    let n = match &v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
        .map(|x| x.round().clamp(0.0, 100.0) as u8)
        .ok_or_else(|| D::Error::custom(format!("invalid score: {}", v)))
}

impl VerificationResult {
    /// Score at or above the threshold AND no discrepancies at all.
    pub fn passed(&self) -> bool {
        self.overall_match_score >= PASS_THRESHOLD && self.discrepancies.is_empty()
    }

    pub fn needs_review(&self) -> bool {
        !self.passed()
    }

    /// Discrepancies of one severity, original order preserved.
    pub fn discrepancies_by_severity(
        &self,
        severity: DiscrepancySeverity,
    ) -> impl Iterator<Item = &Discrepancy> {
        self.discrepancies.iter().filter(move |d| d.severity == severity)
    }

    pub fn response_schema() -> ResponseSchema {
        let s = ResponseSchema::string;
        let score = || ResponseSchema::integer().describe("0-100");
        ResponseSchema::object([
            ("overallMatchScore", score()),
            ("colorMatchScore", score()),
            ("layoutMatchScore", score()),
            ("typographyMatchScore", score()),
            (
                "discrepancies",
                ResponseSchema::array(
                    ResponseSchema::object([
                        ("element", s()),
                        ("severity", s().describe("critical, major or minor")),
                        ("expected", s()),
                        ("actual", s()),
                    ])
                    .required(["element", "severity", "expected", "actual"]),
                ),
            ),
            (
                "missingAssets",
                ResponseSchema::array(
                    ResponseSchema::object([
                        ("type", s()),
                        ("description", s()),
                        ("placement", s()),
                        ("required", ResponseSchema::boolean()),
                    ])
                    .required(["type", "description", "placement", "required"]),
                ),
            ),
            ("recommendations", ResponseSchema::array(s())),
        ])
        .required([
            "overallMatchScore",
            "colorMatchScore",
            "layoutMatchScore",
            "typographyMatchScore",
            "discrepancies",
            "missingAssets",
            "recommendations",
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub spec_fingerprint: String,
    pub result: VerificationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationOutcome {
    Verified(VerificationReport),
    /// The verifier's answer could not be used. Unknown, not passed.
    Unavailable { reason: String },
}

impl VerificationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, VerificationOutcome::Verified(r) if r.result.passed())
    }

    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            VerificationOutcome::Verified(r) => Some(r),
            VerificationOutcome::Unavailable { .. } => None,
        }
    }

    /// Whether the report was produced against this exact specification.
    pub fn matches_spec(&self, spec: &DesignSpecification) -> bool {
        match (self.report(), spec_fingerprint(spec)) {
            (Some(r), Ok(fp)) => r.spec_fingerprint == fp,
            _ => false,
        }
    }
}

fn verification_prompt(html: &str, spec: &DesignSpecification, with_image: bool) -> String {
    let sections = spec
        .sections()
        .iter()
        .map(|s| format!("{}. {}", s.order, s.section_type))
        .collect::<Vec<_>>()
        .join("\n");
    let assets = spec
        .assets
        .iter()
        .filter_map(|(name, slot)| slot.as_ref().map(|a| (name, a)))
        .map(|(name, a)| {
            format!(
                "- {} ({}, placement: {}{})",
                name,
                a.asset_type,
                a.placement,
                if a.required { ", required" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let spec_json = serde_json::to_string_pretty(spec).unwrap_or_default();
    let image_note = if with_image {
        "The original concept image is attached; the website should look like it.\n"
    } else {
        ""
    };

    format!(
        "You are a meticulous design QA reviewer. Compare the website markup below against \
         the design specification and score how closely it conforms.\n\
         {image_note}\
         \n\
         Exact hex codes that must appear: {hex}\n\
         Heading font: {heading}; body font: {body}\n\
         Section order:\n{sections}\n\
         Assets:\n{assets}\n\
         \n\
         Full specification:\n{spec_json}\n\
         \n\
         Score colour, layout and typography match and an overall match from 0 to 100. \
         List every discrepancy with severity critical, major or minor, any missing assets, \
         and concrete recommendations.\n\
         \n\
         Website markup:\n{html}",
        hex = spec.colors.exact_hex_codes.join(", "),
        heading = spec.typography.heading_font,
        body = spec.typography.body_font,
    )
}

/// Verify markup against a specification.
///
/// Transport errors propagate. An answer that cannot be decoded yields
/// `VerificationOutcome::Unavailable`.
pub async fn verify_website<C: ModelClient>(
    generator: &Generator<C>,
    ledger: &mut UsageLedger,
    model: &str,
    max_output_tokens: u32,
    html: &str,
    spec: &DesignSpecification,
    concept_image: Option<&InlineImage>,
) -> Result<VerificationOutcome, GenerationError> {
    let mut request = GenerationRequest::new(
        model,
        verification_prompt(html, spec, concept_image.is_some()),
    )
    .with_schema(VerificationResult::response_schema())
    .with_max_output_tokens(max_output_tokens);
    if let Some(image) = concept_image {
        request = request.with_image(image.clone());
    }

    let recovered = generator
        .call_json(Operation::VerifyWebsite, &request, ledger)
        .await?;
    if recovered.is_empty() {
        warn!("verification unavailable: no JSON in model output");
        return Ok(VerificationOutcome::Unavailable {
            reason: "verifier returned no structured result".to_string(),
        });
    }

    let result: VerificationResult = match recovered.decode() {
        Some(r) => r,
        None => {
            warn!("verification unavailable: result shape not recognised");
            return Ok(VerificationOutcome::Unavailable {
                reason: "verifier result could not be decoded".to_string(),
            });
        }
    };

    let fingerprint = spec_fingerprint(spec)
        .map_err(|e| GenerationError::Unparseable(format!("specification: {}", e)))?;

    info!(
        overall = result.overall_match_score,
        discrepancies = result.discrepancies.len(),
        passed = result.passed(),
        "verification complete"
    );

    Ok(VerificationOutcome::Verified(VerificationReport {
        id: Uuid::new_v4(),
        verified_at: Utc::now(),
        spec_fingerprint: fingerprint,
        result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::BrandGuidelines;
    use serde_json::json;

    fn result(score: u8, discrepancies: usize) -> VerificationResult {
        VerificationResult {
            overall_match_score: score,
            color_match_score: score,
            layout_match_score: score,
            typography_match_score: score,
            discrepancies: (0..discrepancies)
                .map(|i| Discrepancy {
                    element: format!("el{}", i),
                    severity: DiscrepancySeverity::Minor,
                    expected: "a".into(),
                    actual: "b".into(),
                })
                .collect(),
            missing_assets: vec![],
            recommendations: vec![],
        }
    }

    #[test]
    fn test_pass_gate() {
        assert!(!result(90, 1).passed());
        assert!(result(85, 0).passed());
        assert!(!result(84, 0).passed());
        assert!(!result(100, 1).passed());
        assert!(result(100, 1).needs_review());
        assert!(!result(85, 0).needs_review());
    }

    #[test]
    fn test_unlabelled_items_keep_result_decodable() {
        let r: VerificationResult = serde_json::from_value(json!({
            "overallMatchScore": 60,
            "discrepancies": [
                {"element": "hero", "expected": "#1E3A8A", "actual": "#000000"},
                {"element": "footer", "severity": null}
            ],
            "missingAssets": [
                {"description": "company logo", "placement": "header", "required": true}
            ]
        }))
        .unwrap();

        assert_eq!(r.discrepancies.len(), 2);
        assert_eq!(r.discrepancies[0].severity, DiscrepancySeverity::Major);
        assert_eq!(r.discrepancies[1].severity, DiscrepancySeverity::Major);
        assert_eq!(r.missing_assets[0].asset_type, "");
        assert!(r.missing_assets[0].required);
        assert!(!r.passed());
        assert!(r.needs_review());
    }

    #[test]
    fn test_lenient_decoding() {
        let r: VerificationResult = serde_json::from_value(json!({
            "overallMatchScore": 91.6,
            "colorMatchScore": "88%",
            "layoutMatchScore": 140,
            "discrepancies": [
                {"element": "h1", "severity": "MAJOR", "expected": "Montserrat", "actual": "Arial"},
                {"element": "footer", "severity": "cosmetic"}
            ]
        }))
        .unwrap();

        assert_eq!(r.overall_match_score, 92);
        assert_eq!(r.color_match_score, 88);
        assert_eq!(r.layout_match_score, 100);
        assert_eq!(r.typography_match_score, 0);
        assert_eq!(r.discrepancies[0].severity, DiscrepancySeverity::Major);
        assert_eq!(r.discrepancies[1].severity, DiscrepancySeverity::Minor);
        assert_eq!(r.discrepancies[1].expected, "");
    }

    #[test]
    fn test_missing_overall_score_rejected() {
        let r = serde_json::from_value::<VerificationResult>(json!({"colorMatchScore": 50}));
        assert!(r.is_err());
        let r = serde_json::from_value::<VerificationResult>(json!({"overallMatchScore": "high"}));
        assert!(r.is_err());
    }

    #[test]
    fn test_grouping_preserves_order() {
        let mut r = result(70, 0);
        for (el, sev) in [
            ("a", DiscrepancySeverity::Minor),
            ("b", DiscrepancySeverity::Critical),
            ("c", DiscrepancySeverity::Minor),
        ] {
            r.discrepancies.push(Discrepancy {
                element: el.into(),
                severity: sev,
                expected: String::new(),
                actual: String::new(),
            });
        }
        let minors: Vec<_> = r
            .discrepancies_by_severity(DiscrepancySeverity::Minor)
            .map(|d| d.element.as_str())
            .collect();
        assert_eq!(minors, vec!["a", "c"]);
        assert_eq!(r.discrepancies[1].element, "b");
    }

    #[test]
    fn test_unavailable_never_passes() {
        let outcome = VerificationOutcome::Unavailable {
            reason: "x".into(),
        };
        assert!(!outcome.passed());
        assert!(outcome.report().is_none());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unavailable");
    }

    #[test]
    fn test_prompt_embeds_constraints() {
        let spec = DesignSpecification::from_brand_guidelines(&BrandGuidelines::fallback());
        let prompt = verification_prompt("<html></html>", &spec, true);
        assert!(prompt.contains("#1E3A8A"));
        assert!(prompt.contains("1. hero"));
        assert!(prompt.contains("5. contact"));
        assert!(prompt.contains("logo (logo, placement: header, required)"));
        assert!(prompt.contains("concept image is attached"));
        assert!(prompt.ends_with("<html></html>"));
    }
}
