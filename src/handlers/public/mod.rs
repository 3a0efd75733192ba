// handlers/public/mod.rs - Handlers that need no bearer token

pub mod admin;
pub mod org;
pub mod root;

pub use admin::login_post;
pub use org::{org_create, org_get};
pub use root::{health_get, root_get};
