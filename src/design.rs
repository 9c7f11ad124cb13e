//! Design Specification - the contract a generated website must satisfy
//!
//! The JSON shape here round-trips through model prompts, so field names
//! are fixed and serialization must be lossless.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::leads::BrandGuidelines;
use crate::schema::ResponseSchema;

/// Fonts the model may choose from and the builder knows how to load.
pub const KNOWN_FONTS: &[&str] = &[
    "Inter",
    "Roboto",
    "Open Sans",
    "Lato",
    "Montserrat",
    "Poppins",
    "Raleway",
    "Nunito",
    "Work Sans",
    "Source Sans Pro",
    "Oswald",
    "Playfair Display",
    "Merriweather",
    "Lora",
    "PT Serif",
];

pub const DEFAULT_SECTIONS: &[&str] = &["hero", "about", "services", "testimonials", "contact"];

pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";
pub const DEFAULT_TEXT: &str = "#1F2937";
const FALLBACK_PALETTE: [&str; 3] = ["#1E3A8A", "#3B82F6", "#F59E0B"];

/// Where a specification came from. Carried for display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecSource {
    /// Read off a concept image by the model.
    Extracted,
    /// Synthesized from brand guidelines.
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSpecification {
    pub colors: Colors,
    pub typography: Typography,
    pub layout: Layout,
    #[serde(default)]
    pub components: Components,
    pub content: Content,
    #[serde(default)]
    pub assets: BTreeMap<String, Option<AssetSlot>>,
    #[serde(default)]
    pub source: SpecSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Colors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    #[serde(default)]
    pub exact_hex_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    Primary,
    Secondary,
    Accent,
    Background,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub heading_font: String,
    pub body_font: String,
    pub base_font_size: String,
    pub heading_sizes: HeadingSizes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingSizes {
    pub h1: String,
    pub h2: String,
    pub h3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub max_width: String,
    pub section_padding: String,
    pub grid_columns: u32,
    pub gutter_width: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub header: HeaderStyle,
    #[serde(default)]
    pub hero: HeroStyle,
    #[serde(default)]
    pub buttons: ButtonStyle,
    #[serde(default)]
    pub cards: CardStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderStyle {
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub logo_placement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeroStyle {
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub alignment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonStyle {
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub border_radius: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStyle {
    #[serde(default)]
    pub border_radius: String,
    #[serde(default)]
    pub shadow: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "type")]
    pub section_type: String,
    pub order: u32,
    #[serde(default)]
    pub required_content: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSlot {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub placement: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_enhancement: Option<bool>,
}

impl DesignSpecification {
    /// Build a specification from brand guidelines alone.
    ///
    /// Brand colours fill primary, secondary and accent in order; everything
    /// else comes from fixed defaults.
    pub fn from_brand_guidelines(guidelines: &BrandGuidelines) -> Self {
        let pick = |i: usize| {
            guidelines
                .colors
                .get(i)
                .filter(|c| is_hex_color(c))
                .cloned()
                .unwrap_or_else(|| FALLBACK_PALETTE[i].to_string())
        };
        let (primary, secondary, accent) = (pick(0), pick(1), pick(2));

        let mut spec = Self {
            colors: Colors {
                exact_hex_codes: vec![
                    primary.clone(),
                    secondary.clone(),
                    accent.clone(),
                    DEFAULT_BACKGROUND.to_string(),
                    DEFAULT_TEXT.to_string(),
                ],
                primary,
                secondary,
                accent,
                background: DEFAULT_BACKGROUND.to_string(),
                text: DEFAULT_TEXT.to_string(),
            },
            typography: Typography {
                heading_font: "Montserrat".to_string(),
                body_font: "Open Sans".to_string(),
                base_font_size: "16px".to_string(),
                heading_sizes: HeadingSizes {
                    h1: "48px".to_string(),
                    h2: "36px".to_string(),
                    h3: "24px".to_string(),
                },
            },
            layout: Layout {
                max_width: "1200px".to_string(),
                section_padding: "80px".to_string(),
                grid_columns: 12,
                gutter_width: "24px".to_string(),
            },
            components: Components {
                header: HeaderStyle {
                    style: "sticky".to_string(),
                    logo_placement: "left".to_string(),
                },
                hero: HeroStyle {
                    height: "80vh".to_string(),
                    alignment: "center".to_string(),
                },
                buttons: ButtonStyle {
                    style: "filled".to_string(),
                    border_radius: "8px".to_string(),
                },
                cards: CardStyle {
                    border_radius: "12px".to_string(),
                    shadow: "subtle".to_string(),
                },
            },
            content: Content::default(),
            assets: BTreeMap::new(),
            source: SpecSource::Default,
        };

        for section in DEFAULT_SECTIONS {
            spec.add_section(*section, default_required_content(section));
        }

        spec.assets.insert(
            "logo".to_string(),
            Some(AssetSlot {
                id: "logo".to_string(),
                asset_type: "logo".to_string(),
                source: if guidelines.logo_url.is_some() { "brand" } else { "upload" }.to_string(),
                url: guidelines.logo_url.clone(),
                placement: "header".to_string(),
                required: true,
                needs_enhancement: None,
            }),
        );
        spec.assets.insert(
            "heroImage".to_string(),
            Some(AssetSlot {
                id: "heroImage".to_string(),
                asset_type: "image".to_string(),
                source: "generated".to_string(),
                url: None,
                placement: "hero".to_string(),
                required: false,
                needs_enhancement: None,
            }),
        );

        spec
    }

    // --- Section editing ---
    //
    // Every edit leaves `order` as the dense sequence 1..N matching vector position.

    pub fn sections(&self) -> &[Section] {
        &self.content.sections
    }

    pub fn section_position(&self, section_type: &str) -> Option<usize> {
        self.content
            .sections
            .iter()
            .position(|s| s.section_type == section_type)
    }

    pub fn add_section(&mut self, section_type: impl Into<String>, required_content: Vec<String>) {
        self.content.sections.push(Section {
            section_type: section_type.into(),
            order: 0,
            required_content,
        });
        self.renumber_sections();
    }

    pub fn remove_section(&mut self, index: usize) -> Option<Section> {
        if index >= self.content.sections.len() {
            return None;
        }
        let removed = self.content.sections.remove(index);
        self.renumber_sections();
        Some(removed)
    }

    /// Returns false when the section is already first or out of range.
    pub fn move_section_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.content.sections.len() {
            return false;
        }
        self.content.sections.swap(index - 1, index);
        self.renumber_sections();
        true
    }

    /// Returns false when the section is already last or out of range.
    pub fn move_section_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.content.sections.len() {
            return false;
        }
        self.content.sections.swap(index, index + 1);
        self.renumber_sections();
        true
    }

    /// Sort by the stated `order` (stable for ties) and renumber 1..N.
    pub fn normalize_section_order(&mut self) {
        self.content.sections.sort_by_key(|s| s.order);
        self.renumber_sections();
    }

    fn renumber_sections(&mut self) {
        for (i, section) in self.content.sections.iter_mut().enumerate() {
            section.order = i as u32 + 1;
        }
    }

    // --- Other edits ---

    pub fn set_color(&mut self, role: ColorRole, hex: impl Into<String>) {
        let hex = hex.into();
        if !self.colors.exact_hex_codes.iter().any(|c| c.eq_ignore_ascii_case(&hex)) {
            self.colors.exact_hex_codes.push(hex.clone());
        }
        let slot = match role {
            ColorRole::Primary => &mut self.colors.primary,
            ColorRole::Secondary => &mut self.colors.secondary,
            ColorRole::Accent => &mut self.colors.accent,
            ColorRole::Background => &mut self.colors.background,
            ColorRole::Text => &mut self.colors.text,
        };
        *slot = hex;
    }

    pub fn set_fonts(&mut self, heading: impl Into<String>, body: impl Into<String>) {
        self.typography.heading_font = heading.into();
        self.typography.body_font = body.into();
    }

    /// Fill an asset slot's URL, e.g. after the user uploads a missing logo.
    /// Returns false when the slot does not exist or is empty.
    pub fn set_asset_url(&mut self, slot: &str, url: impl Into<String>) -> bool {
        match self.assets.get_mut(slot) {
            Some(Some(asset)) => {
                asset.url = Some(url.into());
                true
            }
            _ => false,
        }
    }

    /// Required slots that have no URL yet.
    pub fn missing_required_assets(&self) -> Vec<&AssetSlot> {
        self.assets
            .values()
            .flatten()
            .filter(|a| a.required && a.url.as_deref().map_or(true, str::is_empty))
            .collect()
    }

    /// Schema handed to the model when extracting a specification.
    pub fn response_schema() -> ResponseSchema {
        let s = ResponseSchema::string;
        let asset = ResponseSchema::object([
            ("id", s()),
            ("type", s()),
            ("source", s()),
            ("url", s()),
            ("placement", s()),
            ("required", ResponseSchema::boolean()),
            ("needsEnhancement", ResponseSchema::boolean()),
        ])
        .required(["id", "type", "source", "placement", "required"]);

        ResponseSchema::object([
            (
                "colors",
                ResponseSchema::object([
                    ("primary", s().describe("6-digit hex, e.g. #1A2B3C")),
                    ("secondary", s()),
                    ("accent", s()),
                    ("background", s()),
                    ("text", s()),
                    ("exactHexCodes", ResponseSchema::array(s())),
                ])
                .required(["primary", "secondary", "accent", "background", "text", "exactHexCodes"]),
            ),
            (
                "typography",
                ResponseSchema::object([
                    ("headingFont", s()),
                    ("bodyFont", s()),
                    ("baseFontSize", s()),
                    (
                        "headingSizes",
                        ResponseSchema::object([("h1", s()), ("h2", s()), ("h3", s())])
                            .required(["h1", "h2", "h3"]),
                    ),
                ])
                .required(["headingFont", "bodyFont", "baseFontSize", "headingSizes"]),
            ),
            (
                "layout",
                ResponseSchema::object([
                    ("maxWidth", s()),
                    ("sectionPadding", s()),
                    ("gridColumns", ResponseSchema::integer()),
                    ("gutterWidth", s()),
                ])
                .required(["maxWidth", "sectionPadding", "gridColumns", "gutterWidth"]),
            ),
            (
                "components",
                ResponseSchema::object([
                    ("header", ResponseSchema::object([("style", s()), ("logoPlacement", s())])),
                    ("hero", ResponseSchema::object([("height", s()), ("alignment", s())])),
                    ("buttons", ResponseSchema::object([("style", s()), ("borderRadius", s())])),
                    ("cards", ResponseSchema::object([("borderRadius", s()), ("shadow", s())])),
                ]),
            ),
            (
                "content",
                ResponseSchema::object([(
                    "sections",
                    ResponseSchema::array(
                        ResponseSchema::object([
                            ("type", s()),
                            ("order", ResponseSchema::integer()),
                            ("requiredContent", ResponseSchema::array(s())),
                        ])
                        .required(["type", "order"]),
                    ),
                )])
                .required(["sections"]),
            ),
            (
                "assets",
                ResponseSchema::object([("logo", asset.clone()), ("heroImage", asset)]),
            ),
        ])
        .required(["colors", "typography", "layout", "content"])
    }
}

pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_known_font(name: &str) -> bool {
    KNOWN_FONTS.iter().any(|f| f.eq_ignore_ascii_case(name.trim()))
}

fn default_required_content(section: &str) -> Vec<String> {
    let items: &[&str] = match section {
        "hero" => &["headline", "subheadline", "call to action"],
        "about" => &["business story"],
        "services" => &["service list"],
        "testimonials" => &["customer quotes"],
        "contact" => &["phone", "address", "contact form"],
        _ => &[],
    };
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guidelines() -> BrandGuidelines {
        BrandGuidelines {
            tone: "friendly".into(),
            colors: vec!["#AA0000".into(), "#00AA00".into(), "#0000AA".into()],
            fonts: vec![],
            logo_url: None,
        }
    }

    fn order_of(spec: &DesignSpecification) -> Vec<(String, u32)> {
        spec.sections()
            .iter()
            .map(|s| (s.section_type.clone(), s.order))
            .collect()
    }

    #[test]
    fn test_default_spec_uses_brand_colors_in_order() {
        let spec = DesignSpecification::from_brand_guidelines(&guidelines());
        assert_eq!(spec.colors.primary, "#AA0000");
        assert_eq!(spec.colors.secondary, "#00AA00");
        assert_eq!(spec.colors.accent, "#0000AA");
        assert_eq!(spec.colors.background, DEFAULT_BACKGROUND);
        assert_eq!(spec.source, SpecSource::Default);

        let types: Vec<_> = spec.sections().iter().map(|s| s.section_type.as_str()).collect();
        assert_eq!(types, DEFAULT_SECTIONS);
        assert_eq!(spec.sections().last().unwrap().order, 5);
    }

    #[test]
    fn test_default_spec_fills_bad_colors() {
        let g = BrandGuidelines {
            colors: vec!["red".into()],
            ..guidelines()
        };
        let spec = DesignSpecification::from_brand_guidelines(&g);
        assert_eq!(spec.colors.primary, FALLBACK_PALETTE[0]);
        assert_eq!(spec.colors.accent, FALLBACK_PALETTE[2]);
    }

    #[test]
    fn test_move_down_then_up() {
        let mut spec = DesignSpecification::from_brand_guidelines(&guidelines());
        spec.content.sections.truncate(2);
        spec.add_section("contact", vec![]);

        let about = spec.section_position("about").unwrap();
        assert!(spec.move_section_down(about));
        assert_eq!(
            order_of(&spec),
            vec![("hero".into(), 1), ("contact".into(), 2), ("about".into(), 3)]
        );

        assert!(!spec.move_section_down(2));
        assert!(!spec.move_section_up(0));
        assert!(spec.move_section_up(2));
        assert_eq!(spec.section_position("about"), Some(1));
    }

    #[test]
    fn test_remove_renumbers() {
        let mut spec = DesignSpecification::from_brand_guidelines(&guidelines());
        let removed = spec.remove_section(1).unwrap();
        assert_eq!(removed.section_type, "about");
        let orders: Vec<_> = spec.sections().iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        assert!(spec.remove_section(10).is_none());
    }

    #[test]
    fn test_normalize_gappy_orders() {
        let mut spec = DesignSpecification::from_brand_guidelines(&guidelines());
        spec.content.sections = vec![
            Section { section_type: "contact".into(), order: 9, required_content: vec![] },
            Section { section_type: "hero".into(), order: 2, required_content: vec![] },
            Section { section_type: "about".into(), order: 2, required_content: vec![] },
        ];
        spec.normalize_section_order();
        assert_eq!(
            order_of(&spec),
            vec![("hero".into(), 1), ("about".into(), 2), ("contact".into(), 3)]
        );
    }

    #[test]
    fn test_json_shape() {
        let spec = DesignSpecification::from_brand_guidelines(&guidelines());
        let v = serde_json::to_value(&spec).unwrap();
        assert!(v["colors"]["exactHexCodes"].is_array());
        assert_eq!(v["typography"]["headingSizes"]["h1"], "48px");
        assert_eq!(v["layout"]["gridColumns"], 12);
        assert_eq!(v["content"]["sections"][0]["type"], "hero");
        assert!(v["content"]["sections"][0]["requiredContent"].is_array());
        assert_eq!(v["assets"]["logo"]["placement"], "header");
        assert!(v["assets"]["logo"].get("needsEnhancement").is_none());
        assert_eq!(v["source"], "default");

        let back: DesignSpecification = serde_json::from_value(v).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_empty_asset_slot_round_trips() {
        let mut spec = DesignSpecification::from_brand_guidelines(&guidelines());
        spec.assets.insert("gallery".into(), None);
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains(r#""gallery":null"#));
        let back: DesignSpecification = serde_json::from_str(&json).unwrap();
        assert_eq!(back.assets.get("gallery"), Some(&None));
    }

    #[test]
    fn test_asset_edits() {
        let mut spec = DesignSpecification::from_brand_guidelines(&guidelines());
        assert_eq!(spec.missing_required_assets().len(), 1);
        assert!(spec.set_asset_url("logo", "https://cdn.example/logo.png"));
        assert!(spec.missing_required_assets().is_empty());
        assert!(!spec.set_asset_url("nope", "x"));
    }

    #[test]
    fn test_set_color_tracks_hex_codes() {
        let mut spec = DesignSpecification::from_brand_guidelines(&guidelines());
        spec.set_color(ColorRole::Accent, "#123456");
        assert_eq!(spec.colors.accent, "#123456");
        assert!(spec.colors.exact_hex_codes.contains(&"#123456".to_string()));
    }

    #[test]
    fn test_hex_and_font_helpers() {
        assert!(is_hex_color("#a1B2c3"));
        assert!(!is_hex_color("a1b2c3"));
        assert!(!is_hex_color("#abc"));
        assert!(!is_hex_color("#GGGGGG"));
        assert!(is_known_font(" open sans "));
        assert!(!is_known_font("Comic Sans MS"));
    }
}
