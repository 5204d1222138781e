use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const KEY_COLUMN: &str = "key";
pub const VECTOR_COLUMN: &str = "vector";
pub const METADATA_COLUMN: &str = "metadata";
pub const DISTANCE_COLUMN: &str = "_distance";

/// One row per stored vector. Metadata is a JSON object of string pairs.
pub fn build_vector_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(KEY_COLUMN, DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension as i32),
            true,
        ),
        Field::new(METADATA_COLUMN, DataType::Utf8, true),
    ]))
}

/// Dimension of the vector column, if the schema has one.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

pub fn build_meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None), false),
    ]))
}
