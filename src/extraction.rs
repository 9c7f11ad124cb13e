//! Design Specification Extraction
//!
//! Reads a specification off a concept image. Any failure along the way
//! falls back to the brand-guideline default, so callers always get a
//! usable specification.

use thiserror::Error;
use tracing::{info, warn};

use crate::credits::{Operation, UsageLedger};
use crate::design::{DesignSpecification, SpecSource, KNOWN_FONTS};
use crate::generation::{GenerationError, Generator};
use crate::leads::BrandGuidelines;
use crate::model::{GenerationRequest, InlineImage, ModelClient};
use crate::validation::SpecValidator;

/// Why an extraction attempt was discarded in favour of the default spec.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("no JSON in model output")]
    NoJson,

    #[error("model output does not match the specification shape")]
    Shape,

    #[error("extracted specification is invalid: {0}")]
    Invalid(String),
}

fn extraction_prompt(guidelines: &BrandGuidelines) -> String {
    format!(
        "You are a senior web designer. Inspect the attached website concept image and \
         describe it as a precise design specification.\n\
         \n\
         Rules:\n\
         - Colours: exact 6-digit hex codes as seen in the image (#RRGGBB). List every \
           distinct colour you observe in exactHexCodes, most prominent first.\n\
         - Fonts: choose headingFont and bodyFont from this list only: {fonts}.\n\
         - Layout: CSS lengths for maxWidth, sectionPadding and gutterWidth; gridColumns \
           is an integer between 1 and 24.\n\
         - Sections: every visible page section top to bottom, order starting at 1, with the \
           content each one must contain.\n\
         - Assets: logo and heroImage slots with placement hints; mark required assets.\n\
         \n\
         Known brand guidelines (use them when the image is ambiguous):\n\
         Tone: {tone}\n\
         Brand colours: {colors}",
        fonts = KNOWN_FONTS.join(", "),
        tone = guidelines.tone,
        colors = guidelines.colors.join(", "),
    )
}

/// Extract a specification from a concept image, or fall back to defaults.
pub async fn extract_design_spec<C: ModelClient>(
    generator: &Generator<C>,
    ledger: &mut UsageLedger,
    model: &str,
    max_output_tokens: u32,
    concept_image: &InlineImage,
    guidelines: &BrandGuidelines,
) -> DesignSpecification {
    let request = GenerationRequest::new(model, extraction_prompt(guidelines))
        .with_image(concept_image.clone())
        .with_schema(DesignSpecification::response_schema())
        .with_max_output_tokens(max_output_tokens);

    match try_extract(generator, ledger, &request).await {
        Ok(spec) => {
            info!(sections = spec.sections().len(), "design specification extracted");
            spec
        }
        Err(e) => {
            warn!(reason = %e, "falling back to default design specification");
            DesignSpecification::from_brand_guidelines(guidelines)
        }
    }
}

async fn try_extract<C: ModelClient>(
    generator: &Generator<C>,
    ledger: &mut UsageLedger,
    request: &GenerationRequest,
) -> Result<DesignSpecification, ExtractionError> {
    let recovered = generator
        .call_json(Operation::ExtractSpec, request, ledger)
        .await?;
    if recovered.is_empty() {
        return Err(ExtractionError::NoJson);
    }

    let mut spec: DesignSpecification = recovered.decode().ok_or(ExtractionError::Shape)?;
    spec.normalize_section_order();
    spec.source = SpecSource::Extracted;

    let validation = SpecValidator::new().validate(&spec);
    if !validation.valid {
        return Err(ExtractionError::Invalid(validation.error_summary()));
    }
    for v in &validation.violations {
        warn!(rule = %v.rule, actual = ?v.actual, "{}", v.message);
    }
    Ok(spec)
}
