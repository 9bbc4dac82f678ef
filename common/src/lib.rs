//! Types shared between the portal backend and its clients.

pub mod model;
pub mod requests;
