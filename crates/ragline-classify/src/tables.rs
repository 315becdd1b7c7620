//! Classification tables. Order matters: labels are reported in table order
//! and later strategy rows override earlier ones.

use ragline_core::classification::{BUDGET, EXAMPLE, METHODOLOGY, PROPOSAL};

/// Query type label → pattern tested against the lower-cased query.
pub const QUERY_TYPE_PATTERNS: &[(&str, &str)] = &[
    (BUDGET, r"devis|budget|coût|prix|tarif|estimation|combien"),
    (METHODOLOGY, r"méthode|approche|démarche|process|étapes|comment"),
    ("delivrables", r"livrable|résultat|output|documentation|rapport"),
    ("planning", r"planning|délai|durée|temps|quand|calendrier"),
    ("expertise", r"expert|compétence|skill|profil|qui|équipe"),
    ("secteur", r"secteur|industrie|domaine|vertical|marché"),
    ("comparative", r"compare|différence|versus|vs|alternative"),
    (EXAMPLE, r"exemple|cas|illustration|référence|similaire"),
    (
        PROPOSAL,
        r"propale|proposition|propose-moi|offre|réponse à appel d'offres|réponds.*appel|répond.*offre|proposition commerciale",
    ),
];

pub const TECH_KEYWORDS: &[&str] = &["python", "java", "react", "angular", "cloud", "aws", "azure", "gcp"];

pub struct StrategyRule {
    pub label: &'static str,
    pub search_k: usize,
    pub focus_areas: &'static [&'static str],
}

pub const STRATEGY_RULES: &[StrategyRule] = &[
    StrategyRule { label: BUDGET, search_k: 6, focus_areas: &["budget", "tjm", "estimation"] },
    StrategyRule { label: METHODOLOGY, search_k: 5, focus_areas: &["methodologie", "process", "etapes"] },
    StrategyRule { label: EXAMPLE, search_k: 8, focus_areas: &["cas_client", "reference", "exemple"] },
];

pub const DEFAULT_SEARCH_K: usize = 4;
pub const HIGH_COMPLEXITY_MIN_K: usize = 7;

/// Complexity weights: per word, per question mark, per capitalized token.
pub const WORD_WEIGHT: f32 = 0.1;
pub const QUESTION_WEIGHT: f32 = 2.0;
pub const CAPITALIZED_WEIGHT: f32 = 0.5;
pub const HIGH_THRESHOLD: f32 = 10.0;
pub const MEDIUM_THRESHOLD: f32 = 5.0;
