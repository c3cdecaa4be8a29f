pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod model;
pub mod query;
pub mod service;
pub mod store;
pub mod validation;

pub trait Located {
    fn location(&self) -> snafu::Location;
}
