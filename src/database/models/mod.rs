pub mod admin;
pub mod organization;

pub use admin::Admin;
pub use organization::{Organization, OrganizationSummary};
