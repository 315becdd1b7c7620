//! Domain types shared by the indexes, the reranker and the evaluator.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub type DocId = String;
pub type Meta = BTreeMap<String, String>;

/// Metadata constraints (key → expected value). Keys may name a typed
/// metadata field (English or French spelling) or a free-form variable.
pub type Filters = BTreeMap<String, String>;

/// Values the tagging step writes when it could not find anything.
const PLACEHOLDERS: &[&str] = &["inconnu", "non spécifié", "non specifie", "unknown", "null", "none", "n/a"];

pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty() || PLACEHOLDERS.contains(&v.as_str())
}

fn known<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| scalar_to_string(&v)).filter(|s| !is_placeholder(s)))
}

fn known_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let items = match raw {
        Some(serde_json::Value::Array(values)) => values.iter().filter_map(scalar_to_string).collect(),
        Some(other) => scalar_to_string(&other).into_iter().collect(),
        None => Vec::new(),
    };
    Ok(items.into_iter().filter(|s| !is_placeholder(s)).collect())
}

fn scalar_map<'de, D>(deserializer: D) -> Result<Meta, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| scalar_to_string(&v).filter(|s| !is_placeholder(s)).map(|s| (k, s)))
        .collect())
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Typed document metadata with an open extension map for business variables.
///
/// French corpus keys (`secteur`, `domaine`, `tjm`, ...) are accepted on input;
/// output always uses the English field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, alias = "titre", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "secteur", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, alias = "domaine", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, alias = "sous_domaine", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub sub_domain: Option<String>,
    #[serde(default, alias = "type_projet", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(default, alias = "livrables", deserialize_with = "known_list", skip_serializing_if = "Vec::is_empty")]
    pub deliverables: Vec<String>,
    #[serde(default, alias = "méthodologies", deserialize_with = "known_list", skip_serializing_if = "Vec::is_empty")]
    pub methodologies: Vec<String>,
    #[serde(default, deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, alias = "durée", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Daily rate (TJM).
    #[serde(default, alias = "tjm", deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    #[serde(default, deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "known", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten, deserialize_with = "scalar_map")]
    pub extra: Meta,
}

impl DocumentMetadata {
    /// All values stored under `key`, typed fields first, then `extra`.
    pub fn values(&self, key: &str) -> Vec<&str> {
        fn single(v: &Option<String>) -> Vec<&str> {
            v.as_deref().into_iter().collect()
        }
        match key.trim().to_lowercase().as_str() {
            "title" | "titre" => single(&self.title),
            "sector" | "secteur" => single(&self.sector),
            "domain" | "domaine" => single(&self.domain),
            "sub_domain" | "sous_domaine" | "sous-domaine" => single(&self.sub_domain),
            "project_type" | "type_projet" => single(&self.project_type),
            "client" => single(&self.client),
            "duration" | "durée" => single(&self.duration),
            "rate" | "tjm" => single(&self.rate),
            "budget" => single(&self.budget),
            "source" => single(&self.source),
            "deliverables" | "livrables" => self.deliverables.iter().map(String::as_str).collect(),
            "methodologies" | "méthodologies" => self.methodologies.iter().map(String::as_str).collect(),
            _ => self.extra.get(key).map(String::as_str).into_iter().collect(),
        }
    }

    /// True when every non-empty filter value is present under its key.
    pub fn matches(&self, filters: &Filters) -> bool {
        filters
            .iter()
            .filter(|(_, expected)| !expected.trim().is_empty())
            .all(|(key, expected)| self.values(key).iter().any(|v| v.trim() == expected.trim()))
    }

    pub fn has_budget_info(&self) -> bool { self.rate.is_some() || self.budget.is_some() }

    /// Flat string view used when metadata is shown to the generation model.
    pub fn to_meta(&self) -> Meta {
        let mut out = self.extra.clone();
        let mut put = |k: &str, v: &Option<String>| {
            if let Some(v) = v { out.insert(k.to_string(), v.clone()); }
        };
        put("title", &self.title);
        put("sector", &self.sector);
        put("domain", &self.domain);
        put("sub_domain", &self.sub_domain);
        put("project_type", &self.project_type);
        put("client", &self.client);
        put("duration", &self.duration);
        put("rate", &self.rate);
        put("budget", &self.budget);
        put("source", &self.source);
        if !self.deliverables.is_empty() { out.insert("deliverables".into(), self.deliverables.join(", ")); }
        if !self.methodologies.is_empty() { out.insert("methodologies".into(), self.methodologies.join(", ")); }
        out
    }
}

/// A unit of retrievable text.
///
/// - `id`: index-local handle assigned at corpus load (`<source>:<n>`)
/// - `content`: the passage; two documents with equal content are duplicates
/// - `metadata`: typed business metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: DocId,
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(id: impl Into<DocId>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: DocumentMetadata::default() }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Content cut to `max_chars` characters, with an ellipsis when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        if self.content.chars().count() > max_chars {
            let head: String = self.content.chars().take(max_chars).collect();
            format!("{head}...")
        } else {
            self.content.clone()
        }
    }
}

/// Indicates which index produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Lexical,
    Dense,
}

/// The minimal surface returned by both indexes.
///
/// `id` matches `Document::id`. `score` is index-specific but higher is
/// always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    ClassificationDegraded,
    RetrievalSourceFailed,
    RerankDegraded,
    EvaluationDegraded,
}

/// A sub-computation that fell back to its default value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub reason: String,
}

impl Degradation {
    pub fn new(kind: DegradationKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

/// A value that is either computed normally or substituted by a default.
#[derive(Debug, Clone)]
pub struct Degradable<T> {
    pub value: T,
    pub degradation: Option<Degradation>,
}

impl<T> Degradable<T> {
    pub fn ok(value: T) -> Self { Self { value, degradation: None } }

    pub fn degraded(value: T, kind: DegradationKind, reason: impl Into<String>) -> Self {
        Self { value, degradation: Some(Degradation::new(kind, reason)) }
    }

    pub fn is_degraded(&self) -> bool { self.degradation.is_some() }

    pub fn into_parts(self) -> (T, Option<Degradation>) { (self.value, self.degradation) }
}

/// One line of the generation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub query: String,
    pub context: String,
    pub metadata: serde_json::Value,
    pub response: String,
}
