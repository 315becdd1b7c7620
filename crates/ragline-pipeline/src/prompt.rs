//! Adaptive generation prompt.

use std::fmt::Write as _;

use ragline_core::classification::{QueryClassification, BUDGET, EXAMPLE, METHODOLOGY, PROPOSAL};
use ragline_core::types::Filters;

const FOCUS_BUDGET: &str = "FOCUS DEVIS - La proposition doit particulièrement inclure :
1. Estimation budgétaire détaillée (avec TJM si disponible)
2. Répartition des coûts par phase
3. Facteurs impactant le budget
4. Options d'optimisation des coûts
5. Modalités de facturation proposées";

const FOCUS_PROPOSAL: &str = "FOCUS PROPALE - La proposition doit inclure :
1. Contexte et besoins du client
2. Solution proposée (résumé de l'approche)
3. Méthodologie adaptée
4. Planning estimé
5. Estimation du budget
6. Valeur ajoutée du cabinet
7. Exemples ou cas similaires si disponibles";

const FOCUS_METHODOLOGY: &str = "FOCUS MÉTHODOLOGIE - La proposition doit particulièrement inclure :
1. Démarche étape par étape
2. Outils et méthodes utilisés
3. Rôles et responsabilités
4. Livrables à chaque phase
5. Critères de succès et indicateurs";

const FOCUS_EXAMPLE: &str = "FOCUS EXEMPLES - La proposition doit particulièrement inclure :
1. Références similaires détaillées
2. Cas d'usage concrets
3. Résultats obtenus
4. Adaptations possibles au contexte
5. Leçons apprises et bonnes pratiques";

const STANDARD: &str = "STRUCTURE STANDARD - La proposition doit inclure :
1. Contexte et enjeux client
2. Objectifs identifiés
3. Approche méthodologique
4. Livrables attendus
5. Planning et organisation
6. Budget indicatif
7. Valeur ajoutée proposée";

const INSTRUCTIONS: &str = "CONSIGNES DE RÉDACTION :
- Rédige en français professionnel et structuré
- Exploite le savoir-faire capitalisé dans les documents fournis
- Personnalise selon le secteur et le contexte client
- Propose des solutions concrètes et actionnables

RÉUTILISATION :
- Adapte les méthodes éprouvées aux nouveaux contextes
- Référence les approches similaires déjà menées
- Propose des évolutions basées sur les retours d'expérience";

/// First matching focus wins: devis, propale, methodologie, exemple.
pub fn focus_section(classification: &QueryClassification) -> &'static str {
    [(BUDGET, FOCUS_BUDGET), (PROPOSAL, FOCUS_PROPOSAL), (METHODOLOGY, FOCUS_METHODOLOGY), (EXAMPLE, FOCUS_EXAMPLE)]
        .into_iter()
        .find(|(label, _)| classification.has_type(label))
        .map_or(STANDARD, |(_, section)| section)
}

pub fn build_prompt(
    query: &str,
    context: &str,
    metadata: &serde_json::Value,
    classification: &QueryClassification,
    filters: &Filters,
) -> String {
    let ai = &classification.ai_classification;
    let mut prompt = String::from(
        "Tu es un consultant expert chargé de rédiger des propositions commerciales personnalisées.\n\n",
    );
    prompt.push_str("ANALYSE DE LA REQUÊTE :\n");
    let _ = writeln!(prompt, "- Requête : {query}");
    let _ = writeln!(prompt, "- Type détecté : {}", classification.query_type.join(", "));
    let _ = writeln!(prompt, "- Complexité : {}", classification.complexity.level.as_str());
    let _ = writeln!(prompt, "- Intention : {}", ai.intention);
    let _ = writeln!(prompt, "- Urgence : {}", ai.urgency);
    let _ = writeln!(prompt, "- Type de projet : {}", ai.project_type.as_deref().unwrap_or("Non spécifié"));

    if !filters.is_empty() {
        let applied: Vec<String> = filters.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let _ = writeln!(prompt, "\nFiltres appliqués : {}", applied.join(", "));
    }

    let metadata = serde_json::to_string_pretty(metadata).unwrap_or_else(|_| "{}".to_string());
    let _ = write!(prompt, "\nCONTEXTE EXTRAIT (reranké) :\n{context}\n\nMÉTADONNÉES ASSOCIÉES :\n{metadata}\n\n");
    prompt.push_str(focus_section(classification));
    prompt.push_str("\n\n");
    prompt.push_str(INSTRUCTIONS);
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::classification::{AiClassification, Complexity, ComplexityLevel, QueryEntities, SearchStrategy};

    fn classification(types: &[&str]) -> QueryClassification {
        QueryClassification {
            query_type: types.iter().map(|s| s.to_string()).collect(),
            entities: QueryEntities::default(),
            complexity: Complexity { level: ComplexityLevel::Medium, score: 2.5, word_count: 10, specificity: 1 },
            search_strategy: SearchStrategy::default(),
            ai_classification: AiClassification::default(),
            enhanced_query: String::new(),
            degradations: Vec::new(),
        }
    }

    #[test]
    fn budget_focus_takes_precedence() {
        assert!(focus_section(&classification(&["devis", "exemple"])).starts_with("FOCUS DEVIS"));
        assert!(focus_section(&classification(&["exemple"])).starts_with("FOCUS EXEMPLES"));
        assert!(focus_section(&classification(&["general"])).starts_with("STRUCTURE STANDARD"));
    }

    #[test]
    fn prompt_sections_in_order() {
        let mut filters = Filters::new();
        filters.insert("secteur".into(), "banque".into());
        let prompt = build_prompt(
            "Quel budget ?",
            "Passage A\n\nPassage B",
            &serde_json::json!({"sector": "banque"}),
            &classification(&["methodologie"]),
            &filters,
        );
        let order = ["ANALYSE", "Filtres appliqués : secteur=banque", "CONTEXTE", "Passage B", "MÉTADONNÉES", "FOCUS MÉTHODOLOGIE", "CONSIGNES"];
        let positions: Vec<usize> = order.iter().map(|s| prompt.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
        assert!(prompt.contains("- Complexité : medium"));
        assert!(prompt.contains("- Type de projet : Non spécifié"));
    }

    #[test]
    fn no_filter_line_without_filters() {
        let prompt = build_prompt("q", "c", &serde_json::json!({}), &classification(&["general"]), &Filters::new());
        assert!(!prompt.contains("Filtres appliqués"));
    }
}
