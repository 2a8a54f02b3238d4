use serde::Serialize;
use serde_json::Value;

use crate::engine::SourceField;
use crate::types::FieldType;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("json sample must be an object")]
    NotAnObject,

    #[error("json sample has no fields")]
    Empty,
}

/// One top-level key of a JSON sample and its engine column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingField {
    pub key: String,
    pub value: &'static str,
}

fn field_type(value: &Value) -> FieldType {
    match value {
        Value::Bool(_) => FieldType::Bool,
        Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Int,
        Value::Number(_) => FieldType::Float,
        Value::Object(_) | Value::Array(_) => FieldType::Json,
        Value::String(_) | Value::Null => FieldType::String,
    }
}

/// Infers source fields from a JSON object sample, in document order.
pub fn infer_fields(sample: &str) -> Result<Vec<SourceField>, MappingError> {
    let value: Value = serde_json::from_str(sample)?;
    let Value::Object(map) = value else {
        return Err(MappingError::NotAnObject);
    };
    if map.is_empty() {
        return Err(MappingError::Empty);
    }

    Ok(map
        .iter()
        .map(|(key, value)| SourceField {
            name: key.clone(),
            typ: field_type(value),
        })
        .collect())
}

pub fn kafka_json_mapping(sample: &str) -> Result<Vec<MappingField>, MappingError> {
    Ok(infer_fields(sample)?
        .into_iter()
        .map(|f| MappingField {
            key: f.name,
            value: f.typ.clickhouse_type(),
        })
        .collect())
}
