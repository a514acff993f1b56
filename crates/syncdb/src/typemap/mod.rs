//! Type mapping from canonical types to a target dialect's DDL vocabulary.
//!
//! Each dialect owns its table of equivalents; this module is the single
//! entry point the planner uses, and it reports lossy mappings.

use tracing::warn;

use crate::core::schema::CanonicalType;
use crate::core::traits::{Dialect, TypeMapping};
use crate::error::{Result, SyncError};

/// Map a canonical type to the closest DDL type on `dialect`.
///
/// Deterministic: the same type and dialect always give the same fragment.
/// Width and precision are kept where the dialect supports them and widened
/// otherwise; a widening that loses exactness is flagged as lossy and logged.
/// Unknown types fail with [`SyncError::UnsupportedType`].
pub fn map<D: Dialect + ?Sized>(ty: &CanonicalType, dialect: &D) -> Result<TypeMapping> {
    if let CanonicalType::Unknown(name) = ty {
        return Err(SyncError::UnsupportedType {
            type_name: name.clone(),
            dialect: dialect.name().to_string(),
        });
    }

    let mapping = dialect.canonical_to_native_ddl(ty)?;
    if let Some(ref warning) = mapping.warning {
        warn!("Lossy type mapping {} -> {}: {}", ty, mapping.target_type, warning);
    }
    Ok(mapping)
}
