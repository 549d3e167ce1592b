pub mod config;
pub mod context;
pub mod cookie_store;
pub mod dispatch;
pub mod job;
pub mod node;
pub mod status;
pub mod store;
