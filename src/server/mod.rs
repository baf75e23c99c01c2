mod account;
mod actions;
mod dashboard;
pub mod dto;
pub mod response;
mod router;
pub mod validation;

pub use router::{AppState, create_router};
