pub mod error;
pub mod memory;
pub mod store;
pub mod supabase;

pub use error::DatabaseError;
pub use memory::InMemoryStore;
pub use store::{DeliveryLogStore, MonitorStore};
pub use supabase::{SupabaseClient, SupabaseStore};
