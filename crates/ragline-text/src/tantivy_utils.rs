use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{AsciiFoldingFilter, LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const FRENCH_TOKENIZER: &str = "french_text";

/// Metadata fields indexed as raw strings, paired with the filter keys that
/// address them.
pub const FILTER_FIELDS: &[(&str, &[&str])] = &[
    ("sector", &["sector", "secteur"]),
    ("domain", &["domain", "domaine"]),
    ("sub_domain", &["sub_domain", "sous_domaine", "sous-domaine"]),
    ("project_type", &["project_type", "type_projet"]),
];

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("id", STRING | STORED);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(FRENCH_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
    schema_builder.add_text_field("text", text_options);
    for (name, _) in FILTER_FIELDS {
        schema_builder.add_text_field(name, STRING);
    }
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let stop_words = [
        "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "à", "au", "aux", "dans", "pour", "sur",
        "avec", "par", "ce", "cet", "cette", "ces", "qui", "que", "quoi", "dont", "où", "est", "sont", "en", "d",
        "l", "qu", "c", "j", "s", "n", "il", "elle", "nous", "vous", "ils", "se", "sa", "son", "ses", "leur",
        "leurs", "ne", "pas", "plus",
    ];
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
        .filter(AsciiFoldingFilter)
        .build();
    index.tokenizers().register(FRENCH_TOKENIZER, tokenizer);
}

/// Strip query-parser syntax so arbitrary user text (including enhanced
/// queries such as `budget | secteur: banque`) parses as plain terms.
/// Lower-casing keeps `AND`/`OR`/`NOT` from being read as operators.
pub fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Schema field name for a filter key, if it has a native field.
pub fn filter_field_name(key: &str) -> Option<&'static str> {
    let key = key.trim().to_lowercase();
    FILTER_FIELDS.iter().find(|(_, keys)| keys.contains(&key.as_str())).map(|(name, _)| *name)
}
