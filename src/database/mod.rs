pub mod directory;
pub mod manager;
pub mod memory;
pub mod models;
pub mod partition;

pub use directory::{PgTenantDirectory, TenantDirectory};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{InMemoryPartitionManager, InMemoryTenantDirectory};
pub use partition::{Document, PartitionManager, PgPartitionManager, ID_FIELD};
