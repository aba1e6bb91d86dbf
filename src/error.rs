use std::collections::TryReserveError;

/// Recoverable failure of `StrIndex::insert`.
///
/// Misuse of the index (inserting a linked record, removing one that is not
/// indexed) is not reported here; it panics.
#[derive(Debug)]
pub enum InsertError {
    /// The doubled slot array could not be allocated. The index is left
    /// exactly as it was before the call and the record stays unlinked.
    AllocFailed(TryReserveError),
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertError::AllocFailed(e) => write!(f, "failed to grow slot array: {e}"),
        }
    }
}

impl std::error::Error for InsertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InsertError::AllocFailed(e) => Some(e),
        }
    }
}

impl From<TryReserveError> for InsertError {
    fn from(value: TryReserveError) -> Self {
        Self::AllocFailed(value)
    }
}
