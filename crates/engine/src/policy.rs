//! Merge policy over the units governing a resource.

use std::collections::BTreeSet;

use warden_core::{ErrorCode, OperationType, Unit, UnitIdSet, WardenError, WardenResult};

/// Aggregate protection verdict: protected only when **every** unit
/// protects the operation. A single unit that does not protect it makes
/// the whole set unprotected (least restrictive wins).
///
/// An empty slice is vacuously protected; evaluations short-circuit empty
/// unit sets before reaching here.
pub fn is_protected(units: &[Unit], operation: OperationType) -> bool {
    units.iter().all(|unit| operation.is_protected(unit))
}

/// Fails unless `units` is exactly the requested set: same count, every
/// requested id present once.
///
/// Stricter than a bare count comparison: a same-sized result carrying a
/// foreign or duplicated id would leave a requested unit unchecked by the
/// merge, so it is rejected with the same `OrderUnitsNotFound` code.
pub fn ensure_complete(requested: &UnitIdSet, units: &[Unit]) -> WardenResult<()> {
    let returned: BTreeSet<_> = units.iter().map(|unit| &unit.id).collect();
    let complete = units.len() == requested.len() && returned.iter().copied().eq(requested.iter());

    if !complete {
        tracing::warn!(
            requested = requested.len(),
            returned = units.len(),
            "unit lookup returned an incomplete set"
        );
        return Err(WardenError::Validation(ErrorCode::OrderUnitsNotFound));
    }
    Ok(())
}
