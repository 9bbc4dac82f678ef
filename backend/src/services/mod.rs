pub mod admin;
pub mod manifests;
