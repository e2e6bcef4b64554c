pub mod constraint_manager;
pub mod inference;
pub mod node_loader;
pub mod relationship_loader;

pub use constraint_manager::ConstraintManager;
pub use inference::InferenceEngine;
pub use node_loader::{NodeLoadOutcome, NodeLoader};
pub use relationship_loader::{RelationshipLoadOutcome, RelationshipLoader};

use crate::errors::{EtlError, EtlResult};
use crate::models::{AttributeSpec, Properties};
use crate::sources::SourceRecord;

/// Read and coerce the attribute columns of one record.
///
/// A missing column aborts. Record-local coercion failures leave the property
/// unset and are handed back so the caller decides when to report them.
pub(crate) fn read_attributes(
    attributes: &[AttributeSpec],
    record: &SourceRecord,
) -> EtlResult<(Properties, Vec<EtlError>)> {
    let mut properties = Properties::new();
    let mut skipped = Vec::new();

    for attribute in attributes {
        let raw = record.get(attribute.column)?;
        match attribute
            .value_type
            .coerce(raw, attribute.column, record.position())
        {
            Ok(value) => {
                properties.insert(attribute.property, value);
            }
            Err(err) if err.is_record_local() => skipped.push(err),
            Err(err) => return Err(err),
        }
    }

    Ok((properties, skipped))
}
