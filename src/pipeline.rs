//! Concierge Pipeline - one entry point per workflow step
//!
//! Every step either succeeds and updates the project, or fails and leaves
//! the project exactly as it was. A new build or spec always discards the
//! previous verification; verification is never patched in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ConciergeConfig;
use crate::credits::{Operation, UsageLedger};
use crate::design::{is_hex_color, DesignSpecification};
use crate::extraction::extract_design_spec;
use crate::generation::{CallOptions, CapabilityContext, CapabilityHost, GenerationError, Generator};
use crate::leads::{lookup_websites, parse_leads, BrandGuidelines, Lead};
use crate::model::{GenerationRequest, ModelClient, Tool};
use crate::recovery::{recover_json, strip_code_fences};
use crate::schema::ResponseSchema;
use crate::urls::{extract_first_url, looks_like_image_url};
use crate::verifier::{self, VerificationOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing input: {0}")]
    MissingInput(&'static str),

    #[error("Model produced no usable {0}")]
    EmptyOutput(&'static str),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl PipelineError {
    pub fn is_capability_required(&self) -> bool {
        matches!(self, PipelineError::Generation(e) if e.is_capability_required())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchEmail {
    pub subject: String,
    pub body: String,
}

impl PitchEmail {
    fn response_schema() -> ResponseSchema {
        ResponseSchema::object([
            ("subject", ResponseSchema::string()),
            ("body", ResponseSchema::string()),
        ])
        .required(["subject", "body"])
    }
}

/// Working state for one lead's website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteProject {
    pub lead: Lead,
    #[serde(default)]
    pub spec: Option<DesignSpecification>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub verification: Option<VerificationOutcome>,
    #[serde(default)]
    pub pitch_email: Option<PitchEmail>,
}

impl WebsiteProject {
    pub fn new(lead: Lead) -> Self {
        Self {
            lead,
            spec: None,
            html: None,
            verification: None,
            pitch_email: None,
        }
    }

    fn guidelines(&self) -> BrandGuidelines {
        self.lead
            .brand_guidelines
            .clone()
            .unwrap_or_else(BrandGuidelines::fallback)
    }
}

pub struct ConciergePipeline<C> {
    generator: Generator<C>,
    config: ConciergeConfig,
}

impl<C: ModelClient> ConciergePipeline<C> {
    pub fn new(client: C, config: ConciergeConfig) -> Self {
        Self {
            generator: Generator::new(client),
            config,
        }
    }

    pub fn generator(&self) -> &Generator<C> {
        &self.generator
    }

    pub fn config(&self) -> &ConciergeConfig {
        &self.config
    }

    fn text_request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest::new(&self.config.text_model, prompt)
            .with_max_output_tokens(self.config.max_output_tokens)
    }

    async fn call_text(
        &self,
        op: Operation,
        request: &GenerationRequest,
        ledger: &mut UsageLedger,
    ) -> Result<String, PipelineError> {
        let response = self
            .generator
            .call(op, request, ledger, CapabilityContext::default(), CallOptions::default())
            .await?;
        Ok(response.text)
    }

    /// Search for local businesses, then look up each one's own website.
    pub async fn find_leads(
        &self,
        ledger: &mut UsageLedger,
        niche: &str,
        location: &str,
    ) -> Result<Vec<Lead>, PipelineError> {
        // Search-grounded calls take no response schema; recovery handles the shape.
        let request = self
            .text_request(prompts::find_leads(niche, location))
            .with_tool(Tool::WebSearch);
        let text = self.call_text(Operation::FindLeads, &request, ledger).await?;

        let recovered = recover_json(&text);
        if recovered.is_empty() {
            warn!(niche, location, "lead search returned nothing structured");
            return Ok(vec![]);
        }

        let mut leads = parse_leads(recovered.into_value());
        for lead in &mut leads {
            lead.website = lead.website.as_deref().and_then(extract_first_url);
        }
        info!(count = leads.len(), "leads found");

        Ok(lookup_websites(
            &self.generator,
            ledger,
            &self.config.text_model,
            leads,
            self.config.lookup_concurrency,
        )
        .await)
    }

    /// Derive brand guidelines, reading the lead's website when known.
    pub async fn analyze_brand<'p>(
        &self,
        ledger: &mut UsageLedger,
        project: &'p mut WebsiteProject,
    ) -> Result<&'p BrandGuidelines, PipelineError> {
        let mut request = self.text_request(prompts::analyze_brand(&project.lead));
        if project.lead.website.is_some() {
            request = request.with_tool(Tool::UrlContext);
        } else {
            request = request.with_schema(BrandGuidelines::response_schema());
        }
        let text = self.call_text(Operation::AnalyzeBrand, &request, ledger).await?;

        let mut guidelines = match recover_json(&text).decode::<BrandGuidelines>() {
            Some(g) => g,
            None => {
                warn!(business = %project.lead.business_name, "brand analysis unusable, using fallback");
                BrandGuidelines::fallback()
            }
        };
        guidelines.colors.retain(|c| is_hex_color(c));
        guidelines.colors.truncate(3);
        if let Some(url) = &guidelines.logo_url {
            if !looks_like_image_url(url) {
                info!(%url, "discarding logo URL that does not look like an image");
                guidelines.logo_url = None;
            }
        }

        Ok(project.lead.brand_guidelines.insert(guidelines))
    }

    /// Generate a concept image. Needs a paid capability; the host is asked
    /// to select one if necessary and the call is retried once.
    pub async fn generate_concept_image(
        &self,
        ledger: &mut UsageLedger,
        project: &mut WebsiteProject,
        host: &dyn CapabilityHost,
    ) -> Result<(), PipelineError> {
        let prompt = prompts::concept_image(&project.lead, &project.guidelines());
        let request = GenerationRequest::new(&self.config.image_model, prompt);
        let response = self
            .generator
            .call_with_selection(Operation::GenerateConceptImage, &request, ledger, host)
            .await?;

        let image = response
            .images
            .into_iter()
            .next()
            .ok_or(PipelineError::EmptyOutput("concept image"))?;
        project.lead.website_concept_image = Some(image);
        Ok(())
    }

    /// Extract a spec from the concept image when there is one, otherwise
    /// default from brand guidelines. Never fails.
    pub async fn prepare_design_spec<'p>(
        &self,
        ledger: &mut UsageLedger,
        project: &'p mut WebsiteProject,
    ) -> &'p DesignSpecification {
        let guidelines = project.guidelines();
        let spec = match &project.lead.website_concept_image {
            Some(image) => {
                extract_design_spec(
                    &self.generator,
                    ledger,
                    &self.config.text_model,
                    self.config.max_output_tokens,
                    image,
                    &guidelines,
                )
                .await
            }
            None => DesignSpecification::from_brand_guidelines(&guidelines),
        };
        project.verification = None;
        project.spec.insert(spec)
    }

    pub async fn build_website(
        &self,
        ledger: &mut UsageLedger,
        project: &mut WebsiteProject,
    ) -> Result<(), PipelineError> {
        let spec = project.spec.as_ref().ok_or(PipelineError::MissingInput("design specification"))?;
        let request = self.text_request(prompts::build_website(&project.lead, spec)?);
        let text = self.call_text(Operation::BuildWebsite, &request, ledger).await?;
        self.replace_html(project, &text)
    }

    /// Chat-style edit of the current website.
    pub async fn edit_website(
        &self,
        ledger: &mut UsageLedger,
        project: &mut WebsiteProject,
        instruction: &str,
    ) -> Result<(), PipelineError> {
        let html = project.html.as_deref().ok_or(PipelineError::MissingInput("website"))?;
        let request = self.text_request(prompts::edit_website(html, instruction));
        let text = self.call_text(Operation::EditWebsite, &request, ledger).await?;
        self.replace_html(project, &text)
    }

    pub async fn verify_website<'p>(
        &self,
        ledger: &mut UsageLedger,
        project: &'p mut WebsiteProject,
    ) -> Result<&'p VerificationOutcome, PipelineError> {
        let html = project.html.as_deref().ok_or(PipelineError::MissingInput("website"))?;
        let spec = project.spec.as_ref().ok_or(PipelineError::MissingInput("design specification"))?;

        let outcome = verifier::verify_website(
            &self.generator,
            ledger,
            &self.config.text_model,
            self.config.max_output_tokens,
            html,
            spec,
            project.lead.website_concept_image.as_ref(),
        )
        .await?;
        Ok(project.verification.insert(outcome))
    }

    /// Regenerate the website addressing the last verification report.
    pub async fn fix_issues(
        &self,
        ledger: &mut UsageLedger,
        project: &mut WebsiteProject,
    ) -> Result<(), PipelineError> {
        let html = project.html.as_deref().ok_or(PipelineError::MissingInput("website"))?;
        let spec = project.spec.as_ref().ok_or(PipelineError::MissingInput("design specification"))?;
        let report = project
            .verification
            .as_ref()
            .and_then(VerificationOutcome::report)
            .ok_or(PipelineError::MissingInput("verification report"))?;

        let request = self.text_request(prompts::fix_issues(html, spec, &report.result)?);
        let text = self.call_text(Operation::FixIssues, &request, ledger).await?;
        self.replace_html(project, &text)
    }

    pub async fn draft_pitch_email<'p>(
        &self,
        ledger: &mut UsageLedger,
        project: &'p mut WebsiteProject,
    ) -> Result<&'p PitchEmail, PipelineError> {
        let request = self
            .text_request(prompts::pitch_email(&project.lead, project.html.is_some()))
            .with_schema(PitchEmail::response_schema());
        let text = self.call_text(Operation::DraftPitchEmail, &request, ledger).await?;

        let email = match recover_json(&text).decode::<PitchEmail>() {
            Some(email) => email,
            None if !text.trim().is_empty() => PitchEmail {
                subject: format!("A new website concept for {}", project.lead.business_name),
                body: strip_code_fences(&text),
            },
            None => return Err(PipelineError::EmptyOutput("pitch email")),
        };
        Ok(project.pitch_email.insert(email))
    }

    fn replace_html(&self, project: &mut WebsiteProject, text: &str) -> Result<(), PipelineError> {
        let html = extract_html(text).ok_or(PipelineError::EmptyOutput("website markup"))?;
        info!(bytes = html.len(), "website markup updated");
        project.html = Some(html);
        project.verification = None;
        Ok(())
    }
}

/// Pull an HTML document out of model output.
pub fn extract_html(text: &str) -> Option<String> {
    let cleaned = strip_code_fences(&text.replace("```html", "").replace("```HTML", ""));
    let lower = cleaned.to_ascii_lowercase();

    let start = lower.find("<!doctype").or_else(|| lower.find("<html"));
    let html = match start {
        Some(start) => {
            let end = lower
                .rfind("</html>")
                .filter(|e| *e > start)
                .map(|e| e + "</html>".len())
                .unwrap_or(cleaned.len());
            cleaned[start..end].to_string()
        }
        None if cleaned.contains('<') => cleaned,
        None => return None,
    };
    Some(html)
}

mod prompts {
    use super::*;
    use crate::verifier::VerificationResult;

    pub(super) fn find_leads(niche: &str, location: &str) -> String {
        format!(
            "Find up to 10 real local businesses in {location} in the \"{niche}\" category that \
             would benefit from a new website. Return JSON only, in the form \
             {{\"leads\": [{{\"businessName\", \"details\", \"address\", \"phone\", \"rating\", \"website\"}}]}}. \
             Leave website empty when the business has no site of its own."
        )
    }

    pub(super) fn analyze_brand(lead: &Lead) -> String {
        let source = match &lead.website {
            Some(url) => format!("Read their current website at {url}."),
            None => "They have no website; infer from the description.".to_string(),
        };
        format!(
            "Analyse the brand of \"{name}\" ({details}). {source}\n\
             Return JSON only: {{\"tone\": string, \"colors\": [three 6-digit hex codes, most \
             prominent first], \"fonts\": [font names], \"logoUrl\": direct URL of their logo image or null}}.",
            name = lead.business_name,
            details = lead.details,
        )
    }

    pub(super) fn concept_image(lead: &Lead, guidelines: &BrandGuidelines) -> String {
        format!(
            "Design a full-page homepage mockup for \"{name}\" ({details}). Tone: {tone}. \
             Brand colours: {colors}. Show a header with logo, hero, about, services, \
             testimonials and contact sections. Desktop layout, high fidelity.",
            name = lead.business_name,
            details = lead.details,
            tone = guidelines.tone,
            colors = guidelines.colors.join(", "),
        )
    }

    pub(super) fn build_website(
        lead: &Lead,
        spec: &DesignSpecification,
    ) -> Result<String, PipelineError> {
        let spec_json = serde_json::to_string_pretty(spec)
            .map_err(|e| GenerationError::Unparseable(e.to_string()))?;
        Ok(format!(
            "Build a complete single-file HTML website (inline CSS, Google Fonts allowed) for \
             \"{name}\".\nBusiness details: {details}\nPhone: {phone}\nAddress: {address}\n\n\
             Follow this design specification exactly: use the exact hex codes, the named \
             fonts, the section order and every asset URL given.\n{spec_json}\n\n\
             Return only the HTML document.",
            name = lead.business_name,
            details = lead.details,
            phone = lead.phone.as_deref().unwrap_or("n/a"),
            address = lead.address.as_deref().unwrap_or("n/a"),
        ))
    }

    pub(super) fn edit_website(html: &str, instruction: &str) -> String {
        format!(
            "Apply this change to the website and return the full updated HTML document only.\n\
             Change: {instruction}\n\nCurrent HTML:\n{html}"
        )
    }

    pub(super) fn fix_issues(
        html: &str,
        spec: &DesignSpecification,
        result: &VerificationResult,
    ) -> Result<String, PipelineError> {
        let issues = serde_json::to_string_pretty(&serde_json::json!({
            "discrepancies": result.discrepancies,
            "missingAssets": result.missing_assets,
            "recommendations": result.recommendations,
        }))
        .map_err(|e| GenerationError::Unparseable(e.to_string()))?;
        let spec_json = serde_json::to_string(spec)
            .map_err(|e| GenerationError::Unparseable(e.to_string()))?;
        Ok(format!(
            "The website below scored {score}/100 against its design specification. Fix every \
             issue listed and return the full corrected HTML document only.\n\n\
             Issues:\n{issues}\n\nSpecification:\n{spec_json}\n\nCurrent HTML:\n{html}",
            score = result.overall_match_score,
        ))
    }

    pub(super) fn pitch_email(lead: &Lead, has_site: bool) -> String {
        let offer = if has_site {
            "We have already built a new website concept for them."
        } else {
            "We would like to design a new website for them."
        };
        format!(
            "Write a short, friendly cold email to the owner of \"{name}\" ({details}). {offer} \
             Mention one specific strength of their business and invite them to a quick call. \
             Return JSON: {{\"subject\": string, \"body\": string}}.",
            name = lead.business_name,
            details = lead.details,
        )
    }
}
