//! Prompt and response handling for the model-based sub-classification.

use ragline_core::classification::AiClassification;

pub fn build_prompt(query: &str) -> String {
    format!(
        r#"Analyse cette requête commerciale et classe-la selon les critères suivants.

Requête : "{query}"

Réponds uniquement avec un objet JSON de la forme :
{{
  "intention": "description courte de l'intention",
  "urgence": "low|medium|high",
  "secteur_probable": "secteur détecté ou null",
  "type_projet": "conseil|formation|audit|developpement|autre",
  "budget_mentionne": true,
  "mots_cles": ["mot1", "mot2", "mot3"]
}}"#
    )
}

/// Parse the model output, tolerating code fences and prose around the
/// JSON object.
pub fn parse_response(raw: &str) -> Result<AiClassification, String> {
    let start = raw.find('{').ok_or_else(|| "no JSON object in model output".to_string())?;
    let end = raw.rfind('}').filter(|e| *e > start).ok_or_else(|| "unterminated JSON object in model output".to_string())?;
    serde_json::from_str(&raw[start..=end]).map_err(|e| format!("invalid classification JSON: {e}"))
}
