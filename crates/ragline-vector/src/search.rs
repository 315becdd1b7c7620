//! Dense (vector) index backed by a LanceDB table.
//!
//! The connection and table handles are opened once and reused. Calls are
//! driven on a shared runtime owned by this module, so callers must be on a
//! plain or blocking thread (the retriever runs it through `spawn_blocking`).

use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tokio::runtime::Runtime;
use tracing::debug;

use ragline_core::traits::VectorIndexer;
use ragline_core::types::{Document, Filters, SearchHit, SourceKind};

use crate::schema::{build_arrow_schema, METADATA_COLUMNS};
use crate::table::{open_db, replace_table, table_exists};
use crate::writer::documents_to_record_batch;

#[derive(Default)]
struct Handles {
    conn: Option<Connection>,
    table: Option<Table>,
}

pub struct LanceDenseIndex {
    uri: String,
    table_name: String,
    dim: usize,
    handles: Mutex<Handles>,
}

impl LanceDenseIndex {
    pub fn new(uri: impl Into<String>, table_name: impl Into<String>, dim: usize) -> Self {
        Self { uri: uri.into(), table_name: table_name.into(), dim, handles: Mutex::new(Handles::default()) }
    }

    pub fn dim(&self) -> usize { self.dim }

    /// Whether a table handle is cached for reuse by later searches.
    pub fn is_open(&self) -> bool {
        self.handles().map(|h| h.table.is_some()).unwrap_or(false)
    }

    pub async fn search_async(&self, query_vec: &[f32], k: usize, filters: &Filters) -> Result<Vec<SearchHit>> {
        if k == 0 { return Ok(vec![]); }
        if query_vec.len() != self.dim {
            return Err(anyhow!("query vector has dim {} but the index expects {}", query_vec.len(), self.dim));
        }
        let Some(table) = self.table().await? else { return Ok(vec![]) };

        let mut query = table.vector_search(query_vec.to_vec())?.distance_type(DistanceType::Cosine).limit(k);
        if let Some(predicate) = build_predicate(filters) {
            debug!("Dense filter: {}", predicate);
            query = query.only_if(predicate);
        }
        let mut stream = query.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_hits(&batch)?);
        }
        hits.truncate(k);
        Ok(hits)
    }

    pub async fn index_async(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        let batch = if documents.is_empty() { None } else { Some(documents_to_record_batch(documents, embeddings, self.dim)?) };
        let conn = self.connection().await?;
        let table = replace_table(&conn, &self.table_name, build_arrow_schema(self.dim), batch).await?;
        self.handles()?.table = Some(table);
        debug!("Dense index table '{}' holds {} rows", self.table_name, documents.len());
        Ok(())
    }

    fn handles(&self) -> Result<MutexGuard<'_, Handles>> {
        self.handles.lock().map_err(|_| anyhow!("lance handle cache poisoned"))
    }

    async fn connection(&self) -> Result<Connection> {
        if let Some(conn) = self.handles()?.conn.clone() { return Ok(conn); }
        let conn = open_db(&self.uri).await?;
        self.handles()?.conn = Some(conn.clone());
        Ok(conn)
    }

    /// Cached table handle, opened on first use. `None` while the table
    /// does not exist yet; that state is not cached.
    async fn table(&self) -> Result<Option<Table>> {
        if let Some(table) = self.handles()?.table.clone() { return Ok(Some(table)); }
        let conn = self.connection().await?;
        if !table_exists(&conn, &self.table_name).await? { return Ok(None); }
        let table = conn.open_table(&self.table_name).execute().await?;
        debug!("Opened dense index table '{}'", self.table_name);
        self.handles()?.table = Some(table.clone());
        Ok(Some(table))
    }
}

impl VectorIndexer for LanceDenseIndex {
    fn index(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        block_on(self.index_async(documents, embeddings))
    }

    fn search_vec(&self, query_vec: &[f32], k: usize, filters: &Filters) -> Result<Vec<SearchHit>> {
        block_on(self.search_async(query_vec, k, filters))
    }
}

/// Shared by every index so cached handles always run on the runtime that
/// opened them. Never dropped.
fn runtime() -> Result<&'static Runtime> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    if let Some(rt) = RUNTIME.get() { return Ok(rt); }
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("lance-io")
        .enable_all()
        .build()?;
    Ok(RUNTIME.get_or_init(|| rt))
}

fn block_on<F: Future<Output = Result<T>>, T>(fut: F) -> Result<T> {
    runtime()?.block_on(fut)
}

/// SQL predicate over the metadata columns; keys without a column are skipped.
pub fn build_predicate(filters: &Filters) -> Option<String> {
    let clauses: Vec<String> = filters
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .filter_map(|(k, v)| column_for(k).map(|col| format!("{} = '{}'", col, v.trim().replace('\'', "''"))))
        .collect();
    if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
}

fn column_for(key: &str) -> Option<&'static str> {
    match key.trim().to_lowercase().as_str() {
        "sector" | "secteur" => Some(METADATA_COLUMNS[0]),
        "domain" | "domaine" => Some(METADATA_COLUMNS[1]),
        "sub_domain" | "sous_domaine" | "sous-domaine" => Some(METADATA_COLUMNS[2]),
        "project_type" | "type_projet" => Some(METADATA_COLUMNS[3]),
        _ => None,
    }
}

fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let ids = batch
        .column_by_name("id")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("result batch has no 'id' column"))?;
    let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
    Ok((0..batch.num_rows())
        .map(|i| {
            let score = match distances {
                Some(d) if !d.is_null(i) => 1.0 - d.value(i),
                _ => 0.0,
            };
            SearchHit { id: ids.value(i).to_string(), score, source: SourceKind::Dense }
        })
        .collect())
}
