//! Leads and Brand Guidelines
//!
//! A lead is mostly an opaque carrier for the pipeline; only a few fields
//! feed prompts. Website lookup fans out one call per lead.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credits::{Operation, UsageLedger};
use crate::generation::Generator;
use crate::model::{GenerationRequest, InlineImage, ModelClient, Tool};
use crate::schema::ResponseSchema;
use crate::urls::extract_first_url;

/// Model-supplied leads are decoded leniently: a mistyped optional field
/// is dropped or coerced, never fatal to the whole lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(default = "Uuid::new_v4", deserialize_with = "lenient_id")]
    pub id: Uuid,
    pub business_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub details: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub website: Option<String>,
    #[serde(default)]
    pub brand_guidelines: Option<BrandGuidelines>,
    #[serde(default)]
    pub website_concept_image: Option<InlineImage>,
}

/// Keep a well-formed UUID, otherwise mint a fresh one.
fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<Uuid, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_str()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .unwrap_or_else(Uuid::new_v4))
}

/// Strings pass through, numbers and booleans are stringified, blanks and
/// anything else become `None`.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    let text = match v {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Ok(None),
    };
    let trimmed = text.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_text(d)?.unwrap_or_default())
}

/// Accepts numbers and numeric strings ("4.5", "4.5/5"); anything else is `None`.
fn lenient_rating<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    let n = match &v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .split('/')
            .next()
            .and_then(|head| head.trim().parse::<f64>().ok()),
        _ => None,
    };
    Ok(n.filter(|x| x.is_finite()))
}

impl Lead {
    pub fn new(business_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_name: business_name.into(),
            details: details.into(),
            address: None,
            phone: None,
            rating: None,
            website: None,
            brand_guidelines: None,
            website_concept_image: None,
        }
    }

    pub fn list_schema() -> ResponseSchema {
        ResponseSchema::object([(
            "leads",
            ResponseSchema::array(
                ResponseSchema::object([
                    ("businessName", ResponseSchema::string()),
                    ("details", ResponseSchema::string()),
                    ("address", ResponseSchema::string()),
                    ("phone", ResponseSchema::string()),
                    ("rating", ResponseSchema::number()),
                    ("website", ResponseSchema::string()),
                ])
                .required(["businessName", "details"]),
            ),
        )])
        .required(["leads"])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandGuidelines {
    pub tone: String,
    /// Up to three brand colours, most prominent first.
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub fonts: Vec<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl BrandGuidelines {
    /// Used when analysis produced nothing.
    pub fn fallback() -> Self {
        Self {
            tone: "professional and welcoming".to_string(),
            colors: vec!["#1E3A8A".into(), "#3B82F6".into(), "#F59E0B".into()],
            fonts: vec![],
            logo_url: None,
        }
    }

    pub fn response_schema() -> ResponseSchema {
        ResponseSchema::object([
            ("tone", ResponseSchema::string()),
            (
                "colors",
                ResponseSchema::array(ResponseSchema::string().describe("6-digit hex")),
            ),
            ("fonts", ResponseSchema::array(ResponseSchema::string())),
            ("logoUrl", ResponseSchema::string()),
        ])
        .required(["tone", "colors"])
    }
}

/// Accept either `{"leads": [...]}` or a bare array. Entries without a
/// business name are dropped.
pub fn parse_leads(value: Value) -> Vec<Lead> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("leads") {
            Some(Value::Array(items)) => items,
            _ => vec![],
        },
        _ => vec![],
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Lead>(item) {
            Ok(lead) if !lead.business_name.trim().is_empty() => Some(lead),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "skipping malformed lead");
                None
            }
        })
        .collect()
}

fn lookup_prompt(lead: &Lead) -> String {
    format!(
        "Find the official website of this business. Reply with the URL only.\n\
         Business: {name}\n\
         Details: {details}\n\
         Address: {address}",
        name = lead.business_name,
        details = lead.details,
        address = lead.address.as_deref().unwrap_or("unknown"),
    )
}

/// Look up official websites for leads that lack one.
///
/// One call per lead, at most `concurrency` in flight. Output order matches
/// input order regardless of completion order. A failed lookup leaves that
/// lead unchanged.
pub async fn lookup_websites<C: ModelClient>(
    generator: &Generator<C>,
    ledger: &mut UsageLedger,
    model: &str,
    leads: Vec<Lead>,
    concurrency: usize,
) -> Vec<Lead> {
    let pending = leads.iter().filter(|l| l.website.is_none()).count();
    for _ in 0..pending {
        generator.charge(ledger, Operation::LookupWebsite);
    }
    info!(leads = leads.len(), lookups = pending, "looking up websites");

    stream::iter(leads)
        .map(|mut lead| async move {
            if lead.website.is_some() {
                return lead;
            }
            let request =
                GenerationRequest::new(model, lookup_prompt(&lead)).with_tool(Tool::WebSearch);
            match generator.dispatch(&request).await {
                Ok(resp) => lead.website = extract_first_url(&resp.text),
                Err(e) => warn!(business = %lead.business_name, error = %e, "website lookup failed"),
            }
            lead
        })
        .buffered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = json!({"leads": [{"businessName": "Joe's", "details": "pizza"}]});
        let bare = json!([{"businessName": "Ann's", "details": "bakery", "rating": 4.5}]);

        let a = parse_leads(wrapped);
        let b = parse_leads(bare);
        assert_eq!(a[0].business_name, "Joe's");
        assert_eq!(b[0].rating, Some(4.5));
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn test_parse_drops_bad_entries() {
        let v = json!([
            {"businessName": "", "details": "x"},
            {"details": "no name"},
            {"businessName": "Keep", "details": "y"}
        ]);
        let leads = parse_leads(v);
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].business_name, "Keep");
    }

    #[test]
    fn test_parse_keeps_leads_with_mistyped_fields() {
        let v = json!([
            {"id": 1, "businessName": "Joe's", "details": "pizza"},
            {"businessName": "Ann's", "details": "bakery", "rating": "4.5"},
            {"businessName": "Bo's", "details": 42, "phone": 5551234, "address": null, "website": ""}
        ]);
        let leads = parse_leads(v);
        assert_eq!(leads.len(), 3);
        assert_eq!(leads[1].rating, Some(4.5));
        assert_eq!(leads[2].phone.as_deref(), Some("5551234"));
        assert_eq!(leads[2].details, "42");
        assert_eq!(leads[2].address, None);
        assert_eq!(leads[2].website, None);
    }

    #[test]
    fn test_lead_id_kept_when_valid() {
        let id = Uuid::new_v4();
        let leads = parse_leads(json!([
            {"id": id.to_string(), "businessName": "Joe's"},
            {"id": "not-a-uuid", "businessName": "Ann's", "rating": "n/a"}
        ]));
        assert_eq!(leads[0].id, id);
        assert_ne!(leads[1].id, id);
        assert_eq!(leads[1].rating, None);
    }

    #[test]
    fn test_lead_round_trips_through_serde() {
        let mut lead = Lead::new("Joe's", "pizza");
        lead.rating = Some(4.2);
        lead.phone = Some("555-1234".into());
        let back: Lead = serde_json::from_value(serde_json::to_value(&lead).unwrap()).unwrap();
        assert_eq!(back, lead);
    }

    #[test]
    fn test_parse_unexpected_shape() {
        assert!(parse_leads(json!({"other": 1})).is_empty());
        assert!(parse_leads(json!({})).is_empty());
    }

    #[test]
    fn test_brand_guidelines_camel_case() {
        let g: BrandGuidelines =
            serde_json::from_value(json!({"tone": "bold", "colors": ["#000000"], "logoUrl": "https://x.example/logo.png"}))
                .unwrap();
        assert_eq!(g.logo_url.as_deref(), Some("https://x.example/logo.png"));
        assert!(g.fonts.is_empty());
    }
}
