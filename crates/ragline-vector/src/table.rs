//! LanceDB connection and table helpers.

use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::Schema;
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Make `name` hold exactly the rows of `batch`, creating the table if
/// needed. Returns the handle the rows were written through.
pub async fn replace_table(conn: &Connection, name: &str, schema: Arc<Schema>, batch: Option<RecordBatch>) -> Result<Table> {
    let batches: Vec<std::result::Result<RecordBatch, arrow_schema::ArrowError>> = batch.into_iter().map(Ok).collect();
    let has_rows = !batches.is_empty();
    let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
    if table_exists(conn, name).await? {
        let table = conn.open_table(name).execute().await?;
        table.delete("true").await?;
        if has_rows { table.add(reader).execute().await?; }
        Ok(table)
    } else {
        Ok(conn.create_table(name, reader).execute().await?)
    }
}
