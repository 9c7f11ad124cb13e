//! Concierge Core - structured-output pipeline for lead-to-website generation
//!
//! # Ground Rules
//! 1. Model Output Is Untrusted Text
//! 2. Recovery Never Fails, Empty Is Not Valid
//! 3. The Specification Is the Contract
//! 4. Verification Is Re-derived, Never Patched
//! 5. Debits Happen on Dispatch
//! 6. Capability Gating Is Explicit

pub mod config;
pub mod credits;
pub mod design;
pub mod extraction;
pub mod generation;
pub mod hashing;
pub mod leads;
pub mod model;
pub mod pipeline;
pub mod recovery;
pub mod schema;
pub mod urls;
pub mod validation;
pub mod verifier;

pub use config::{ConciergeConfig, ConfigError};
pub use credits::{LedgerEntry, Operation, UsageLedger};
pub use design::{DesignSpecification, Section, SpecSource};
pub use extraction::{extract_design_spec, ExtractionError};
pub use generation::{CallOptions, CapabilityContext, CapabilityHost, GenerationError, Generator};
pub use hashing::{canonical_json, spec_fingerprint};
pub use leads::{BrandGuidelines, Lead};
pub use model::{GeminiClient, GenerationRequest, GenerationResponse, InlineImage, ModelClient, ModelError};
pub use pipeline::{ConciergePipeline, PipelineError, PitchEmail, WebsiteProject};
pub use recovery::{recover_as, recover_json, Recovered};
pub use urls::{extract_first_url, looks_like_image_url};
pub use validation::{SpecValidation, SpecValidator};
pub use verifier::{VerificationOutcome, VerificationReport, VerificationResult, PASS_THRESHOLD};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
