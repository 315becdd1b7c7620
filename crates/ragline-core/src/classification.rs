//! Output schema of the query classifier.
//!
//! Field names are part of the public contract: downstream consumers parse
//! the serialized form, so renames here are breaking changes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{is_placeholder, Degradation};

pub const GENERAL: &str = "general";
pub const BUDGET: &str = "devis";
pub const METHODOLOGY: &str = "methodologie";
pub const EXAMPLE: &str = "exemple";
pub const PROPOSAL: &str = "propale";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEntities {
    pub sectors: Vec<String>,
    pub domains: Vec<String>,
    pub technologies: Vec<String>,
}

impl QueryEntities {
    pub fn has_taxonomy_match(&self) -> bool { !self.sectors.is_empty() || !self.domains.is_empty() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    pub level: ComplexityLevel,
    pub score: f32,
    pub word_count: usize,
    /// Number of capitalized tokens (proper-noun proxy).
    pub specificity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStrategy {
    pub search_k: usize,
    pub use_filters: bool,
    pub expand_query: bool,
    pub prioritize_recent: bool,
    pub focus_areas: Vec<String>,
}

impl Default for SearchStrategy {
    fn default() -> Self {
        Self { search_k: 4, use_filters: false, expand_query: false, prioritize_recent: false, focus_areas: Vec::new() }
    }
}

fn optional_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).filter(|s| !is_placeholder(s)))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "oui" | "yes" | "1"),
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// Intent record returned by the generation model.
///
/// The model is asked for French keys; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiClassification {
    #[serde(default = "unclassified")]
    pub intention: String,
    #[serde(default = "medium", alias = "urgence")]
    pub urgency: String,
    #[serde(default, alias = "secteur_probable", deserialize_with = "optional_label")]
    pub probable_sector: Option<String>,
    #[serde(default, alias = "type_projet", deserialize_with = "optional_label")]
    pub project_type: Option<String>,
    #[serde(default, alias = "budget_mentionne", deserialize_with = "lenient_bool")]
    pub budget_mentioned: bool,
    #[serde(default, alias = "mots_cles")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn unclassified() -> String { "unclassified".to_string() }
fn medium() -> String { "medium".to_string() }

impl Default for AiClassification {
    fn default() -> Self {
        Self {
            intention: unclassified(),
            urgency: medium(),
            probable_sector: None,
            project_type: None,
            budget_mentioned: false,
            keywords: Vec::new(),
            error: None,
        }
    }
}

impl AiClassification {
    /// Default record carrying the reason the model could not be used.
    pub fn fallback(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub query_type: Vec<String>,
    pub entities: QueryEntities,
    pub complexity: Complexity,
    pub search_strategy: SearchStrategy,
    pub ai_classification: AiClassification,
    pub enhanced_query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl QueryClassification {
    pub fn has_type(&self, label: &str) -> bool { self.query_type.iter().any(|t| t == label) }

    /// Budget intent from either the model or the pattern table.
    pub fn budget_intent(&self) -> bool { self.ai_classification.budget_mentioned || self.has_type(BUDGET) }
}
