pub mod directory;
pub mod supabase;

pub use directory::{InMemoryPractitionerDirectory, PractitionerDirectory};
pub use supabase::SupabasePractitionerDirectory;
