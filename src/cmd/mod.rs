pub mod config;
pub mod models;
pub mod plan;
pub mod template;
pub mod ticket;
