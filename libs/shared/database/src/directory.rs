use thiserror::Error;

use crate::supabase::SupabaseError;

/// Failure reported by a practitioner or patient directory backend.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory backend error: {0}")]
    Backend(#[from] SupabaseError),

    #[error("Malformed directory record: {0}")]
    Malformed(String),
}
