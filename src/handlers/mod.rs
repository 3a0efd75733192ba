// handlers/mod.rs - HTTP handlers
//
// public/    - no token required (root, health, login, create, get)
// protected/ - bearer token required (update, delete)

pub mod protected;
pub mod public;
pub mod utils;

pub use utils::{MessageResponse, OrganizationEnvelope};
