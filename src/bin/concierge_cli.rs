//! Concierge CLI - bridge interface for the web app backend
//!
//! Commands: recover, extract-url, image-url, default-spec, validate-spec,
//!           extract-spec, build, verify
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when nothing was recovered or verification did not pass

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use concierge_core::{
    recover_json, extract_first_url, looks_like_image_url,
    BrandGuidelines, ConciergeConfig, ConciergePipeline, DesignSpecification, GeminiClient,
    InlineImage, Lead, SpecValidator, UsageLedger, WebsiteProject, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "concierge-cli")]
#[command(about = "Concierge CLI - lead-to-website generation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover JSON from noisy model output (file or stdin)
    Recover {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the first non-denylisted URL in some text
    ExtractUrl {
        text: String,
    },

    /// Check whether a URL looks like an image
    ImageUrl {
        url: String,
    },

    /// Build the default design specification from brand guidelines
    DefaultSpec {
        #[arg(short, long, default_value = "professional")]
        tone: String,

        /// Comma-separated hex colours
        #[arg(long, value_delimiter = ',')]
        colors: Vec<String>,
    },

    /// Validate a design specification file
    ValidateSpec {
        #[arg(short, long)]
        spec: PathBuf,
    },

    /// Extract a design specification from a concept image
    ExtractSpec {
        #[arg(short, long)]
        image: PathBuf,

        /// Brand guidelines JSON
        #[arg(short, long)]
        guidelines: Option<PathBuf>,
    },

    /// Build a website from a lead and a design specification
    Build {
        #[arg(short, long)]
        lead: PathBuf,

        #[arg(short, long)]
        spec: PathBuf,
    },

    /// Verify a built website against a design specification
    Verify {
        #[arg(long)]
        html: PathBuf,

        #[arg(short, long)]
        spec: PathBuf,

        /// Original concept image
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
}

fn emit(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    emit(&json!({ "success": false, "error": message.to_string() }));
    ExitCode::FAILURE
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))
}

fn read_image(path: &Path) -> Result<InlineImage, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("png");
    Ok(InlineImage::from_bytes(InlineImage::mime_for_extension(ext), &bytes))
}

fn pipeline(config: ConciergeConfig) -> Result<ConciergePipeline<GeminiClient>, String> {
    let client = GeminiClient::from_config(&config).map_err(|e| e.to_string())?;
    Ok(ConciergePipeline::new(client, config))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("concierge v{}", ENGINE_VERSION);

    let cli = Cli::parse();

    let config = match ConciergeConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    match cli.command {
        Commands::Recover { input } => {
            let mut text = String::new();
            let read = match &input {
                Some(path) => std::fs::read_to_string(path).map(|t| text = t),
                None => std::io::stdin().read_to_string(&mut text).map(|_| ()),
            };
            if let Err(e) = read {
                return fail(e);
            }

            let recovered = recover_json(&text);
            let empty = recovered.is_empty();
            emit(&json!({ "recovered": !empty, "value": recovered.into_value() }));
            if empty { ExitCode::from(2) } else { ExitCode::SUCCESS }
        }

        Commands::ExtractUrl { text } => {
            emit(&json!({ "url": extract_first_url(&text) }));
            ExitCode::SUCCESS
        }

        Commands::ImageUrl { url } => {
            emit(&json!({ "url": url, "image": looks_like_image_url(&url) }));
            ExitCode::SUCCESS
        }

        Commands::DefaultSpec { tone, colors } => {
            let guidelines = BrandGuidelines {
                tone,
                colors,
                fonts: vec![],
                logo_url: None,
            };
            emit(&json!(DesignSpecification::from_brand_guidelines(&guidelines)));
            ExitCode::SUCCESS
        }

        Commands::ValidateSpec { spec } => {
            let spec: DesignSpecification = match read_json(&spec) {
                Ok(s) => s,
                Err(e) => return fail(e),
            };
            let result = SpecValidator::new().validate(&spec);
            emit(&json!(result));
            if result.valid { ExitCode::SUCCESS } else { ExitCode::from(2) }
        }

        Commands::ExtractSpec { image, guidelines } => {
            let image = match read_image(&image) {
                Ok(i) => i,
                Err(e) => return fail(e),
            };
            let guidelines = match guidelines.as_deref().map(read_json::<BrandGuidelines>) {
                Some(Ok(g)) => g,
                Some(Err(e)) => return fail(e),
                None => BrandGuidelines::fallback(),
            };
            let pipeline = match pipeline(config) {
                Ok(p) => p,
                Err(e) => return fail(e),
            };

            let mut lead = Lead::new("Concept", "");
            lead.brand_guidelines = Some(guidelines);
            lead.website_concept_image = Some(image);
            let mut project = WebsiteProject::new(lead);
            let mut ledger = UsageLedger::new();

            let spec = pipeline.prepare_design_spec(&mut ledger, &mut project).await;
            emit(&json!({ "success": true, "spec": spec, "ledger": ledger }));
            ExitCode::SUCCESS
        }

        Commands::Build { lead, spec } => {
            let (lead, spec) = match (read_json::<Lead>(&lead), read_json::<DesignSpecification>(&spec)) {
                (Ok(l), Ok(s)) => (l, s),
                (Err(e), _) | (_, Err(e)) => return fail(e),
            };
            let pipeline = match pipeline(config) {
                Ok(p) => p,
                Err(e) => return fail(e),
            };

            let mut project = WebsiteProject::new(lead);
            project.spec = Some(spec);
            let mut ledger = UsageLedger::new();

            match pipeline.build_website(&mut ledger, &mut project).await {
                Ok(()) => {
                    emit(&json!({ "success": true, "html": project.html, "ledger": ledger }));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    emit(&json!({ "success": false, "error": e.to_string(), "ledger": ledger }));
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Verify { html, spec, image } => {
            let html = match std::fs::read_to_string(&html) {
                Ok(h) => h,
                Err(e) => return fail(format!("Failed to read {}: {}", html.display(), e)),
            };
            let spec: DesignSpecification = match read_json(&spec) {
                Ok(s) => s,
                Err(e) => return fail(e),
            };
            let image = match image.as_deref().map(read_image) {
                Some(Ok(i)) => Some(i),
                Some(Err(e)) => return fail(e),
                None => None,
            };
            let pipeline = match pipeline(config) {
                Ok(p) => p,
                Err(e) => return fail(e),
            };

            let mut lead = Lead::new("Verification", "");
            lead.website_concept_image = image;
            let mut project = WebsiteProject::new(lead);
            project.spec = Some(spec);
            project.html = Some(html);
            let mut ledger = UsageLedger::new();

            match pipeline.verify_website(&mut ledger, &mut project).await {
                Ok(outcome) => {
                    let passed = outcome.passed();
                    emit(&json!({ "success": true, "passed": passed, "verification": outcome }));
                    if passed { ExitCode::SUCCESS } else { ExitCode::from(2) }
                }
                Err(e) => fail(e),
            }
        }
    }
}
