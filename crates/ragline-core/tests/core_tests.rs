use std::fs;
use std::io::Write;
use tempfile::TempDir;

use proptest::prelude::*;
use ragline_core::config::{Config, EmbeddingKind, FusionKind, RerankWeights};
use ragline_core::data_processor::{ChunkingConfig, DataProcessor};
use ragline_core::taxonomy::Taxonomy;
use ragline_core::types::{Degradable, DegradationKind, Document, DocumentMetadata, Filters};

fn filters(pairs: &[(&str, &str)]) -> Filters {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn load_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let chunks = DataProcessor::new().load(tmp.path()).expect("load");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].content.trim(), "Short text");
    assert_eq!(chunks[0].id, "a.txt:0");
    assert!(chunks[0].metadata.source.as_deref().unwrap().ends_with("a.txt"));
}

#[test]
fn txt_title_is_first_informative_line() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("note.txt");
    fs::write(&path, "Ref\nMigration du datalake client\n\nCorps du document.").unwrap();

    let chunks = DataProcessor::new().load(&path).unwrap();
    assert_eq!(chunks[0].metadata.title.as_deref(), Some("Migration du datalake client"));
}

#[test]
fn json_array_accepts_french_keys_and_drops_placeholders() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("refs.json");
    fs::write(
        &path,
        r#"[
          {"content": "Refonte du SI de paiement.", "metadata": {"secteur": "banque", "domaine": "Data", "tjm": 650, "client": "inconnu", "region": "IDF"}},
          {"content": "Audit cloud.", "metadata": {"secteur": "non spécifié", "livrables": ["rapport", "N/A"]}}
        ]"#,
    )
    .unwrap();

    let docs = DataProcessor::new().load(&path).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "refs.json:0");
    assert_eq!(docs[1].id, "refs.json:1");

    let m = &docs[0].metadata;
    assert_eq!(m.sector.as_deref(), Some("banque"));
    assert_eq!(m.domain.as_deref(), Some("Data"));
    assert_eq!(m.rate.as_deref(), Some("650"));
    assert_eq!(m.client, None);
    assert_eq!(m.extra.get("region").map(String::as_str), Some("IDF"));
    assert!(m.has_budget_info());

    let m = &docs[1].metadata;
    assert_eq!(m.sector, None);
    assert_eq!(m.deliverables, vec!["rapport".to_string()]);
    assert!(!m.has_budget_info());
}

#[test]
fn jsonl_skips_blank_lines_and_reports_bad_lines() {
    let tmp = TempDir::new().unwrap();
    let good = tmp.path().join("good.jsonl");
    fs::write(&good, "{\"content\": \"un\"}\n\n{\"content\": \"deux\"}\n").unwrap();
    assert_eq!(DataProcessor::new().load(&good).unwrap().len(), 2);

    let bad = tmp.path().join("bad.jsonl");
    fs::write(&bad, "{\"content\": \"un\"}\nnot json\n").unwrap();
    let err = DataProcessor::new().load(&bad).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn missing_corpus_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::new().load(&tmp.path().join("absent")).unwrap_err();
    assert!(matches!(err, ragline_core::error::Error::NotFound(_)));
}

#[test]
fn directory_walk_ignores_other_extensions() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    fs::write(tmp.path().join("a.txt"), "alpha bravo").unwrap();
    fs::write(tmp.path().join("sub/b.jsonl"), "{\"content\": \"charlie\"}").unwrap();
    fs::write(tmp.path().join("c.md"), "ignored").unwrap();

    let docs = DataProcessor::new().load(tmp.path()).unwrap();
    let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a.txt:0", "sub/b.jsonl:0"]);
}

#[test]
fn same_stem_files_get_distinct_ids() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("a")).unwrap();
    fs::create_dir(tmp.path().join("b")).unwrap();
    fs::write(tmp.path().join("a/notes.txt"), "Notes du projet alpha").unwrap();
    fs::write(tmp.path().join("b/notes.txt"), "Notes du projet bravo").unwrap();
    fs::write(tmp.path().join("refs.json"), r#"[{"content": "Référence json"}]"#).unwrap();
    fs::write(tmp.path().join("refs.jsonl"), "{\"content\": \"Référence jsonl\"}\n").unwrap();

    let docs = DataProcessor::new().load(tmp.path()).unwrap();
    let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a/notes.txt:0", "b/notes.txt:0", "refs.json:0", "refs.jsonl:0"]);

    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), docs.len());
    let contents: Vec<_> = docs.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["Notes du projet alpha", "Notes du projet bravo", "Référence json", "Référence jsonl"]);
}

#[test]
fn short_paragraphs_are_packed_together() {
    let chunks = DataProcessor::new().chunk_text("alpha\n\nbeta\n\n\n\ngamma");
    assert_eq!(chunks, vec!["alpha\n\nbeta\n\ngamma".to_string()]);
}

#[test]
fn long_paragraph_is_split_with_word_overlap() {
    let processor = DataProcessor::with_chunking(ChunkingConfig { max_chars: 20, overlap_chars: 6 });
    let chunks = processor.chunk_text("aaaa bbbb cccc dddd eeee ffff");
    assert_eq!(chunks, vec!["aaaa bbbb cccc dddd".to_string(), "dddd eeee ffff".to_string()]);
}

#[test]
fn filters_match_typed_and_extra_keys() {
    let meta: DocumentMetadata =
        serde_json::from_str(r#"{"secteur": "banque", "domaine": "Data", "region": "IDF"}"#).unwrap();

    assert!(meta.matches(&filters(&[("secteur", "banque")])));
    assert!(meta.matches(&filters(&[("sector", "banque"), ("domain", "Data")])));
    assert!(meta.matches(&filters(&[("region", "IDF")])));
    assert!(meta.matches(&filters(&[("secteur", "  ")])), "blank values are ignored");
    assert!(!meta.matches(&filters(&[("secteur", "assurance")])));
    assert!(!meta.matches(&filters(&[("client", "ACME")])));
}

#[test]
fn preview_truncates_on_char_boundary() {
    let doc = Document::new("d", "éééééé");
    assert_eq!(doc.preview(3), "ééé...");
    assert_eq!(doc.preview(10), "éééééé");
}

#[test]
fn degradable_carries_reason() {
    let d = Degradable::degraded(0.0f32, DegradationKind::RerankDegraded, "embedder down");
    assert!(d.is_degraded());
    let (value, reason) = d.into_parts();
    assert_eq!(value, 0.0);
    assert_eq!(reason.unwrap().reason, "embedder down");
    assert!(!Degradable::ok(1).is_degraded());
}

#[test]
fn taxonomy_with_root_key_and_aliases() {
    let yaml = r#"
taxonomie:
  secteurs: [banque, assurance]
  domaines:
    - nom: Data
      sous-domaines: [BI, IA]
  livrables: [rapport]
  alias:
    banque: [bancaire, Banking]
"#;
    let tax = Taxonomy::from_yaml(yaml).unwrap();
    assert_eq!(tax.sectors, vec!["banque", "assurance"]);
    assert_eq!(tax.domains[0].sub_domains, vec!["BI", "IA"]);

    let sectors = tax.sector_terms();
    assert_eq!(sectors[0].0, "banque");
    assert_eq!(sectors[0].1, vec!["banque", "bancaire", "banking"]);
    assert_eq!(sectors[1].1, vec!["assurance"]);
    assert_eq!(tax.domain_terms()[0].1, vec!["data"]);
}

#[test]
fn taxonomy_without_root_and_empty_file() {
    let tax = Taxonomy::from_yaml("sectors: [retail]\n").unwrap();
    assert_eq!(tax.sectors, vec!["retail"]);
    assert_eq!(Taxonomy::from_yaml("").unwrap(), Taxonomy::default());
    assert!(Taxonomy::from_yaml("secteurs: {").is_err());
}

#[test]
fn taxonomy_load_reports_missing_file() {
    let tmp = TempDir::new().unwrap();
    assert!(Taxonomy::load(&tmp.path().join("nope.yaml")).is_err());
}

#[test]
fn config_defaults_without_files() {
    let tmp = TempDir::new().unwrap();
    let settings = Config::load_from(tmp.path()).unwrap().settings().unwrap();

    assert_eq!(settings.retrieval.min_candidates, 8);
    assert_eq!(settings.retrieval.max_candidates, 12);
    assert_eq!(settings.retrieval.fusion, FusionKind::Concatenate);
    assert_eq!(settings.embedding.kind, EmbeddingKind::Hash);
    assert_eq!(settings.data.chunk_chars, 1000);
    assert_eq!(settings.rerank.weights, RerankWeights::default());
}

#[test]
fn config_file_overrides_and_resolves_paths() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[retrieval]\nmax_candidates = 20\nfusion = \"reciprocal_rank\"\n\n[data]\ncorpus = \"corpus\"\n",
    )
    .unwrap();

    let config = Config::load_from(tmp.path()).unwrap();
    let settings = config.settings().unwrap();
    assert_eq!(settings.retrieval.max_candidates, 20);
    assert_eq!(settings.retrieval.fusion, FusionKind::ReciprocalRank);
    assert_eq!(config.resolve(&settings.data.corpus), tmp.path().join("corpus"));
    assert_eq!(config.get::<usize>("retrieval.max_candidates").unwrap(), 20);
}

#[test]
fn config_rejects_weights_not_summing_to_one() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[rerank.weights]\nsemantic_similarity = 0.6\n").unwrap();
    let err = Config::load_from(tmp.path()).err().expect("invalid weights must fail");
    assert!(err.to_string().contains("sum to 1.0"), "{err}");
}

#[test]
fn config_rejects_inverted_candidate_bounds() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[retrieval]\nmin_candidates = 15\n").unwrap();
    assert!(Config::load_from(tmp.path()).is_err());
}

proptest! {
    #[test]
    fn chunks_respect_max_chars(
        text in "[a-z]{1,10}( [a-z]{1,10}){0,40}(\n\n[a-z]{1,10}( [a-z]{1,10}){0,40}){0,3}"
    ) {
        let processor = DataProcessor::with_chunking(ChunkingConfig { max_chars: 50, overlap_chars: 12 });
        let chunks = processor.chunk_text(&text);
        prop_assert!(!chunks.is_empty());
        for chunk in &chunks {
            prop_assert!(!chunk.is_empty());
            prop_assert!(chunk.chars().count() <= 50, "chunk too long: {:?}", chunk);
        }
    }
}
