//! Pre-retrieval query classification.
//!
//! Rule-based analysis (type patterns, taxonomy entities, complexity, search
//! strategy, query enhancement) is synchronous and deterministic. The
//! model-based sub-classification is optional and degrades to a default
//! record on any failure.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use ragline_core::call::run_blocking;
use ragline_core::classification::{
    AiClassification, Complexity, ComplexityLevel, QueryClassification, QueryEntities, SearchStrategy, GENERAL,
};
use ragline_core::config::ClassifierSettings;
use ragline_core::taxonomy::Taxonomy;
use ragline_core::traits::Generator;
use ragline_core::types::{Degradation, DegradationKind};

pub mod ai;
pub mod tables;

use tables::{
    CAPITALIZED_WEIGHT, DEFAULT_SEARCH_K, HIGH_COMPLEXITY_MIN_K, HIGH_THRESHOLD, MEDIUM_THRESHOLD, QUERY_TYPE_PATTERNS,
    QUESTION_WEIGHT, STRATEGY_RULES, TECH_KEYWORDS, WORD_WEIGHT,
};

pub struct QueryClassifier {
    type_patterns: Vec<(&'static str, Regex)>,
    capitalized: Regex,
    taxonomy: Taxonomy,
    generator: Option<Arc<dyn Generator>>,
    settings: ClassifierSettings,
}

impl QueryClassifier {
    pub fn new(taxonomy: Taxonomy, generator: Option<Arc<dyn Generator>>, settings: ClassifierSettings) -> Result<Self, regex::Error> {
        let type_patterns = QUERY_TYPE_PATTERNS
            .iter()
            .map(|(label, pattern)| Regex::new(pattern).map(|re| (*label, re)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { type_patterns, capitalized: Regex::new(r"\b\p{Lu}\p{Ll}+\b")?, taxonomy, generator, settings })
    }

    /// Rule-only classifier (no model call).
    pub fn offline(taxonomy: Taxonomy) -> Result<Self, regex::Error> {
        Self::new(taxonomy, None, ClassifierSettings { ai_enabled: false, ..ClassifierSettings::default() })
    }

    pub fn taxonomy(&self) -> &Taxonomy { &self.taxonomy }

    /// Full classification, including the model-based record when enabled.
    pub async fn classify(&self, query: &str) -> QueryClassification {
        let mut classification = self.classify_rules(query);
        let generator = match (&self.generator, self.settings.ai_enabled) {
            (Some(g), true) => Arc::clone(g),
            _ => return classification,
        };

        let prompt = ai::build_prompt(query);
        let timeout = Duration::from_millis(self.settings.ai_timeout_ms);
        let outcome = run_blocking("ai classification", timeout, move || generator.generate(&prompt))
            .await
            .map_err(|e| e.to_string())
            .and_then(|raw| ai::parse_response(&raw));
        match outcome {
            Ok(record) => classification.ai_classification = record,
            Err(reason) => {
                warn!("AI classification degraded: {}", reason);
                classification.ai_classification = AiClassification::fallback(reason.clone());
                classification.degradations.push(Degradation::new(DegradationKind::ClassificationDegraded, reason));
            }
        }
        classification
    }

    /// Everything except the model-based record, which is left at its default.
    pub fn classify_rules(&self, query: &str) -> QueryClassification {
        let lowered = query.to_lowercase();
        let query_type = self.detect_types(&lowered);
        let entities = self.extract_entities(&lowered);
        let complexity = self.analyze_complexity(query);
        let search_strategy = recommend_strategy(&query_type, &entities, &complexity);
        let enhanced_query = enhance_query(query, &entities);
        debug!("Query types {:?}, complexity {} ({:.1})", query_type, complexity.level.as_str(), complexity.score);
        QueryClassification {
            query_type,
            entities,
            complexity,
            search_strategy,
            ai_classification: AiClassification::default(),
            enhanced_query,
            degradations: Vec::new(),
        }
    }

    pub fn detect_types(&self, lowered: &str) -> Vec<String> {
        let types: Vec<String> = self
            .type_patterns
            .iter()
            .filter(|(_, re)| re.is_match(lowered))
            .map(|(label, _)| label.to_string())
            .collect();
        if types.is_empty() { vec![GENERAL.to_string()] } else { types }
    }

    pub fn extract_entities(&self, lowered: &str) -> QueryEntities {
        let matching = |terms: Vec<(&str, Vec<String>)>| -> Vec<String> {
            terms
                .into_iter()
                .filter(|(_, spellings)| spellings.iter().any(|s| lowered.contains(s.as_str())))
                .map(|(name, _)| name.to_string())
                .collect()
        };
        QueryEntities {
            sectors: matching(self.taxonomy.sector_terms()),
            domains: matching(self.taxonomy.domain_terms()),
            technologies: TECH_KEYWORDS.iter().filter(|t| lowered.contains(*t)).map(|t| t.to_string()).collect(),
        }
    }

    pub fn analyze_complexity(&self, query: &str) -> Complexity {
        let word_count = query.split_whitespace().count();
        let question_marks = query.matches('?').count();
        let specificity = self.capitalized.find_iter(query).count();
        let score = word_count as f32 * WORD_WEIGHT + question_marks as f32 * QUESTION_WEIGHT + specificity as f32 * CAPITALIZED_WEIGHT;
        let level = if score > HIGH_THRESHOLD {
            ComplexityLevel::High
        } else if score > MEDIUM_THRESHOLD {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        };
        Complexity { level, score, word_count, specificity }
    }
}

pub fn recommend_strategy(query_type: &[String], entities: &QueryEntities, complexity: &Complexity) -> SearchStrategy {
    let mut strategy = SearchStrategy { search_k: DEFAULT_SEARCH_K, ..SearchStrategy::default() };
    for rule in STRATEGY_RULES.iter().filter(|r| query_type.iter().any(|t| t == r.label)) {
        strategy.search_k = rule.search_k;
        strategy.focus_areas = rule.focus_areas.iter().map(|s| s.to_string()).collect();
    }
    strategy.use_filters = entities.has_taxonomy_match();
    if complexity.level == ComplexityLevel::High {
        strategy.search_k = strategy.search_k.max(HIGH_COMPLEXITY_MIN_K);
        strategy.expand_query = true;
    }
    strategy
}

/// `query | secteur: a, b | domaine: x | technologies: y`, empty groups omitted.
pub fn enhance_query(query: &str, entities: &QueryEntities) -> String {
    let mut parts = vec![query.to_string()];
    for (label, values) in [("secteur", &entities.sectors), ("domaine", &entities.domains), ("technologies", &entities.technologies)] {
        if !values.is_empty() {
            parts.push(format!("{}: {}", label, values.join(", ")));
        }
    }
    parts.join(" | ")
}
