//! Response Schemas
//!
//! Typed calls hand the model a schema so its answer is more likely to be
//! valid JSON already. Recovery still runs on every answer.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSchema {
    String { description: Option<String> },
    Integer { description: Option<String> },
    Number { description: Option<String> },
    Boolean { description: Option<String> },
    Array { items: Box<ResponseSchema> },
    Object {
        properties: Vec<(String, ResponseSchema)>,
        required: Vec<String>,
    },
}

impl ResponseSchema {
    pub fn string() -> Self {
        Self::String { description: None }
    }

    pub fn integer() -> Self {
        Self::Integer { description: None }
    }

    pub fn number() -> Self {
        Self::Number { description: None }
    }

    pub fn boolean() -> Self {
        Self::Boolean { description: None }
    }

    pub fn array(items: ResponseSchema) -> Self {
        Self::Array { items: Box::new(items) }
    }

    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, ResponseSchema)>,
        K: Into<String>,
    {
        Self::Object {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            required: vec![],
        }
    }

    /// Mark fields as required. No-op on non-object schemas.
    pub fn required<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        if let Self::Object { required, .. } = &mut self {
            required.extend(fields.into_iter().map(Into::into));
        }
        self
    }

    /// Attach a description to a primitive schema.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Self::String { description }
            | Self::Integer { description }
            | Self::Number { description }
            | Self::Boolean { description } => *description = Some(text.into()),
            _ => {}
        }
        self
    }

    /// Render in the provider's schema dialect.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String { description } => primitive("STRING", description),
            Self::Integer { description } => primitive("INTEGER", description),
            Self::Number { description } => primitive("NUMBER", description),
            Self::Boolean { description } => primitive("BOOLEAN", description),
            Self::Array { items } => json!({ "type": "ARRAY", "items": items.to_json() }),
            Self::Object { properties, required } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                let mut obj = json!({ "type": "OBJECT", "properties": props });
                if !required.is_empty() {
                    obj["required"] = json!(required);
                }
                obj
            }
        }
    }
}

fn primitive(kind: &str, description: &Option<String>) -> Value {
    match description {
        Some(d) => json!({ "type": kind, "description": d }),
        None => json!({ "type": kind }),
    }
}
