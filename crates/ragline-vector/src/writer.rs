use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray};
use std::sync::Arc;

use ragline_core::types::Document;

use crate::schema::build_arrow_schema;

/// Pack documents and their embeddings into one Arrow batch.
pub fn documents_to_record_batch(documents: &[Document], embeddings: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
    ensure!(
        documents.len() == embeddings.len(),
        "documents ({}) and embeddings ({}) length must match",
        documents.len(),
        embeddings.len()
    );
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
        anyhow::bail!("embedding has dim {} but the table expects {}", bad.len(), dim);
    }

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
    let column = |get: fn(&Document) -> &Option<String>| -> StringArray {
        documents.iter().map(|d| get(d).as_deref()).collect()
    };
    let vectors = embeddings.iter().map(|e| Some(e.iter().map(|&x| Some(x)).collect::<Vec<_>>()));

    let record_batch = RecordBatch::try_new(
        build_arrow_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(column(|d| &d.metadata.sector)),
            Arc::new(column(|d| &d.metadata.domain)),
            Arc::new(column(|d| &d.metadata.sub_domain)),
            Arc::new(column(|d| &d.metadata.project_type)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim as i32)),
        ],
    )?;
    Ok(record_batch)
}
