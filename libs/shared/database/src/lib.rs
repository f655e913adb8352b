pub mod directory;
pub mod supabase;

pub use directory::DirectoryError;
pub use supabase::{SupabaseClient, SupabaseError};
