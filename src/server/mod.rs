mod base;
pub mod dto;
mod install;
pub mod response;
mod router;
mod storage;
mod user;
pub mod validation;

pub use router::{AppState, create_router};
