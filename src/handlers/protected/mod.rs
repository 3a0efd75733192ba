// handlers/protected/mod.rs - Handlers behind jwt_auth_middleware
//
// Every handler here receives `Extension<AuthAdmin>` and must check that the
// caller owns the organization it targets.

pub mod org;

pub use org::{org_delete, org_update};
