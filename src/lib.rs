// src/lib.rs
pub mod auto_knock;
pub mod config;
pub mod knocker;
pub mod location;
pub mod mock;
pub mod page;
pub mod render;
pub mod session;
pub mod storage;
pub mod types;

pub use knocker::{KnockClient, KnockError};
pub use page::{KnockState, KnockerPage};
pub use types::{KnockRequest, KnockResponse, Session};
