use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Metadata columns stored next to each vector, usable in filter predicates.
pub const METADATA_COLUMNS: &[&str] = &["sector", "domain", "sub_domain", "project_type"];

pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
    let mut fields = vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
    ];
    fields.extend(METADATA_COLUMNS.iter().map(|name| Field::new(*name, DataType::Utf8, true)));
    fields.push(Field::new(
        "vector",
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
        true,
    ));
    Arc::new(Schema::new(fields))
}
