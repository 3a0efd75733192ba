pub mod naming;
pub mod org_service;

pub use org_service::{
    AdminLogin, CreateOrganization, LoginResponse, OrgError, OrgService, UpdateOrganization, UpdateOutcome,
};
