//! Two-way mapping between a typed record and the engine variable store

use tracing::trace;

use super::model::Model;
use crate::{CoreError, VariableMap};

/// Reserved variable holding the whole record
pub const VARIABLES_KEY: &str = "$v";

/// Extract every declared field of `record`, plus the whole record under
/// [`VARIABLES_KEY`].
pub fn bind<T: Model>(record: &T) -> Result<VariableMap, CoreError> {
    let fields = T::fields();
    let mut map = VariableMap::with_capacity(fields.len() + 1);

    for field in &fields {
        map.insert(field.name.to_string(), (field.get)(record)?);
    }
    map.insert(VARIABLES_KEY.to_string(), whole_record(record)?);

    trace!(fields = fields.len(), "Bound record to variables");
    Ok(map)
}

/// Write the entries of `map` back onto the declared fields of `record` and
/// refresh the whole-record entry.
///
/// Fields without an entry in `map` keep their current value.
pub fn unbind<T: Model>(record: &mut T, map: &mut VariableMap) -> Result<(), CoreError> {
    for field in T::fields() {
        if let Some(value) = map.get(field.name) {
            (field.set)(record, value.clone())?;
        }
    }
    map.insert(VARIABLES_KEY.to_string(), whole_record(record)?);
    Ok(())
}

fn whole_record<T: Model>(record: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(record)
        .map_err(|e| CoreError::BindingFault(format!("cannot serialize record: {}", e)))
}
