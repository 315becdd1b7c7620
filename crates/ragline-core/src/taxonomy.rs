//! Business taxonomy (sectors, domains, deliverables, methodologies).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    #[serde(alias = "nom")]
    pub name: String,
    #[serde(default, alias = "sous-domaines", alias = "sous_domaines")]
    pub sub_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default, alias = "secteurs")]
    pub sectors: Vec<String>,
    #[serde(default, alias = "domaines")]
    pub domains: Vec<DomainEntry>,
    #[serde(default, alias = "livrables")]
    pub deliverables: Vec<String>,
    #[serde(default, alias = "méthodologies")]
    pub methodologies: Vec<String>,
    /// Extra spellings matched exactly, keyed by canonical sector or domain
    /// name (e.g. `banque: [bancaire]`).
    #[serde(default, alias = "alias")]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl Taxonomy {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        Self::from_yaml(&raw).map_err(|message| Error::Parse { path: path.display().to_string(), message })
    }

    /// Parse YAML, with or without the `taxonomie:` root key.
    pub fn from_yaml(raw: &str) -> std::result::Result<Self, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
        let inner = ["taxonomie", "taxonomy"]
            .iter()
            .find_map(|k| value.get(*k).cloned())
            .unwrap_or(value);
        if inner.is_null() { return Ok(Self::default()); }
        serde_yaml::from_value(inner).map_err(|e| e.to_string())
    }

    /// Canonical names paired with every lower-cased spelling that selects them.
    pub fn sector_terms(&self) -> Vec<(&str, Vec<String>)> {
        self.sectors.iter().map(|s| (s.as_str(), self.spellings(s))).collect()
    }

    pub fn domain_terms(&self) -> Vec<(&str, Vec<String>)> {
        self.domains.iter().map(|d| (d.name.as_str(), self.spellings(&d.name))).collect()
    }

    fn spellings(&self, canonical: &str) -> Vec<String> {
        let mut out = vec![canonical.to_lowercase()];
        if let Some(extra) = self.aliases.get(canonical) {
            out.extend(extra.iter().map(|a| a.to_lowercase()));
        }
        out.retain(|s| !s.trim().is_empty());
        out
    }
}
