//! Specification Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy: any Error-level violation makes a specification unusable.

use serde::{Deserialize, Serialize};

use crate::design::{is_hex_color, is_known_font, DesignSpecification};

pub const MAX_GRID_COLUMNS: u32 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecViolation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecValidation {
    pub valid: bool,
    pub violations: Vec<SpecViolation>,
}

impl SpecValidation {
    pub fn errors(&self) -> impl Iterator<Item = &SpecViolation> {
        self.violations.iter().filter(|v| v.severity == Severity::Error)
    }

    /// One-line summary of Error-level violations.
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub trait SpecRule {
    fn name(&self) -> &'static str;
    fn check(&self, spec: &DesignSpecification) -> Vec<SpecViolation>;
}

// --- Concrete Rules ---

pub struct HexColorRule;

impl SpecRule for HexColorRule {
    fn name(&self) -> &'static str { "hex_color" }

    fn check(&self, spec: &DesignSpecification) -> Vec<SpecViolation> {
        let c = &spec.colors;
        let roles = [
            ("primary", &c.primary),
            ("secondary", &c.secondary),
            ("accent", &c.accent),
            ("background", &c.background),
            ("text", &c.text),
        ];

        let mut violations: Vec<_> = roles
            .iter()
            .filter(|(_, value)| !is_hex_color(value))
            .map(|(role, value)| SpecViolation {
                rule: self.name().to_string(),
                severity: Severity::Error,
                message: format!("{} colour is not a 6-digit hex code", role),
                expected: Some("#RRGGBB".to_string()),
                actual: Some(value.to_string()),
            })
            .collect();

        violations.extend(c.exact_hex_codes.iter().filter(|h| !is_hex_color(h)).map(|h| {
            SpecViolation {
                rule: self.name().to_string(),
                severity: Severity::Warning,
                message: "exactHexCodes entry is not a 6-digit hex code".to_string(),
                expected: Some("#RRGGBB".to_string()),
                actual: Some(h.clone()),
            }
        }));

        violations
    }
}

pub struct GridColumnsRule;

impl SpecRule for GridColumnsRule {
    fn name(&self) -> &'static str { "grid_columns" }

    fn check(&self, spec: &DesignSpecification) -> Vec<SpecViolation> {
        let cols = spec.layout.grid_columns;
        if cols == 0 || cols > MAX_GRID_COLUMNS {
            vec![SpecViolation {
                rule: self.name().to_string(),
                severity: Severity::Error,
                message: "Grid column count out of range".to_string(),
                expected: Some(format!("1..={}", MAX_GRID_COLUMNS)),
                actual: Some(cols.to_string()),
            }]
        } else {
            vec![]
        }
    }
}

pub struct SectionOrderRule;

impl SpecRule for SectionOrderRule {
    fn name(&self) -> &'static str { "section_order" }

    fn check(&self, spec: &DesignSpecification) -> Vec<SpecViolation> {
        let sections = spec.sections();
        if sections.is_empty() {
            return vec![SpecViolation {
                rule: self.name().to_string(),
                severity: Severity::Error,
                message: "Specification has no sections".to_string(),
                expected: Some("at least one section".to_string()),
                actual: None,
            }];
        }

        let mut orders: Vec<u32> = sections.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        let dense = orders.iter().enumerate().all(|(i, o)| *o == i as u32 + 1);
        if dense {
            return vec![];
        }

        vec![SpecViolation {
            rule: self.name().to_string(),
            severity: Severity::Error,
            message: "Section order is not a dense sequence".to_string(),
            expected: Some(format!("1..={}", sections.len())),
            actual: Some(format!("{:?}", orders)),
        }]
    }
}

pub struct FontRule;

impl SpecRule for FontRule {
    fn name(&self) -> &'static str { "known_font" }

    fn check(&self, spec: &DesignSpecification) -> Vec<SpecViolation> {
        [&spec.typography.heading_font, &spec.typography.body_font]
            .into_iter()
            .filter(|f| !is_known_font(f))
            .map(|f| SpecViolation {
                rule: self.name().to_string(),
                severity: Severity::Warning,
                message: "Font is not in the supported font set".to_string(),
                expected: None,
                actual: Some(f.clone()),
            })
            .collect()
    }
}

/// Runs every rule and applies the policy.
pub struct SpecValidator {
    rules: Vec<Box<dyn SpecRule + Send + Sync>>,
}

impl SpecValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(HexColorRule),
                Box::new(GridColumnsRule),
                Box::new(SectionOrderRule),
                Box::new(FontRule),
            ],
        }
    }

    pub fn validate(&self, spec: &DesignSpecification) -> SpecValidation {
        let violations: Vec<_> = self.rules.iter().flat_map(|r| r.check(spec)).collect();
        let valid = !violations.iter().any(|v| v.severity == Severity::Error);
        SpecValidation { valid, violations }
    }
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::BrandGuidelines;

    fn spec() -> DesignSpecification {
        DesignSpecification::from_brand_guidelines(&BrandGuidelines::fallback())
    }

    #[test]
    fn test_default_spec_is_valid() {
        let result = SpecValidator::new().validate(&spec());
        assert!(result.valid, "{:?}", result.violations);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_bad_color_blocks() {
        let mut s = spec();
        s.colors.primary = "blue".into();
        let result = SpecValidator::new().validate(&s);
        assert!(!result.valid);
        assert!(result.error_summary().contains("primary"));
    }

    #[test]
    fn test_grid_bounds() {
        let mut s = spec();
        s.layout.grid_columns = 25;
        assert!(!SpecValidator::new().validate(&s).valid);
        s.layout.grid_columns = 24;
        assert!(SpecValidator::new().validate(&s).valid);
        s.layout.grid_columns = 0;
        assert!(!SpecValidator::new().validate(&s).valid);
    }

    #[test]
    fn test_gappy_section_order() {
        let mut s = spec();
        s.content.sections[1].order = 7;
        let result = SpecValidator::new().validate(&s);
        assert!(!result.valid);
        assert_eq!(result.errors().next().unwrap().rule, "section_order");
    }

    #[test]
    fn test_unknown_font_only_warns() {
        let mut s = spec();
        s.set_fonts("Papyrus", "Open Sans");
        let result = SpecValidator::new().validate(&s);
        assert!(result.valid);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Warning);
    }
}
