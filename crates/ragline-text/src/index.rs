use anyhow::Result;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, TantivyDocument, Term};
use tracing::debug;

use ragline_core::traits::TextIndexer;
use ragline_core::types::{Document, Filters, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, filter_field_name, register_tokenizer, sanitize_query};

const WRITER_HEAP_BYTES: usize = 50_000_000;

pub struct TantivyIndexer {
    index: Index,
    id_field: Field,
    text_field: Field,
    sector_field: Field,
    domain_field: Field,
    sub_domain_field: Field,
    project_type_field: Field,
}

impl TantivyIndexer {
    /// Index held entirely in memory; rebuilt from the corpus at startup.
    pub fn in_memory() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    /// On-disk index; any previous content of `index_dir` is removed.
    pub fn create_in_dir(index_dir: &Path) -> Result<Self> {
        if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
        std::fs::create_dir_all(index_dir)?;
        Self::from_index(Index::create_in_dir(index_dir, build_schema())?)
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizer(&index);
        let schema = index.schema();
        Ok(Self {
            id_field: schema.get_field("id")?,
            text_field: schema.get_field("text")?,
            sector_field: schema.get_field("sector")?,
            domain_field: schema.get_field("domain")?,
            sub_domain_field: schema.get_field("sub_domain")?,
            project_type_field: schema.get_field("project_type")?,
            index,
        })
    }

    fn field_for(&self, name: &str) -> Option<Field> {
        match name {
            "sector" => Some(self.sector_field),
            "domain" => Some(self.domain_field),
            "sub_domain" => Some(self.sub_domain_field),
            "project_type" => Some(self.project_type_field),
            _ => None,
        }
    }

    fn to_tantivy_doc(&self, d: &Document) -> TantivyDocument {
        let mut doc = doc!(
            self.id_field => d.id.clone(),
            self.text_field => d.content.clone(),
        );
        let m = &d.metadata;
        for (field, value) in [
            (self.sector_field, &m.sector),
            (self.domain_field, &m.domain),
            (self.sub_domain_field, &m.sub_domain),
            (self.project_type_field, &m.project_type),
        ] {
            if let Some(v) = value { doc.add_text(field, v.trim()); }
        }
        doc
    }
}

impl TextIndexer for TantivyIndexer {
    /// Replace the whole index content with `documents`.
    fn index(&self, documents: &[Document]) -> Result<()> {
        let mut index_writer = self.index.writer(WRITER_HEAP_BYTES)?;
        index_writer.delete_all_documents()?;
        for d in documents {
            index_writer.add_document(self.to_tantivy_doc(d))?;
        }
        index_writer.commit()?;
        debug!("Lexical index holds {} documents", documents.len());
        Ok(())
    }

    fn search(&self, query: &str, k: usize, filters: &Filters) -> Result<Vec<SearchHit>> {
        let text = sanitize_query(query);
        if k == 0 || text.is_empty() { return Ok(vec![]); }

        let qp = QueryParser::for_index(&self.index, vec![self.text_field]);
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, qp.parse_query(&text)?)];
        for (key, value) in filters {
            let value = value.trim();
            if value.is_empty() { continue; }
            if let Some(field) = filter_field_name(key).and_then(|name| self.field_for(name)) {
                let term = Term::from_field_text(field, value);
                clauses.push((Occur::Must, Box::new(TermQuery::new(term, IndexRecordOption::Basic))));
            }
        }
        let q = BooleanQuery::new(clauses);

        let searcher = self.index.reader()?.searcher();
        let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
            hits.push(SearchHit { id, score, source: SourceKind::Lexical });
        }
        Ok(hits)
    }
}
