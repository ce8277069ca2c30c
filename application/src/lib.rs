#[cfg(any(
    feature = "adapters",
    feature = "sqlx",
    feature = "reqwest",
    feature = "image"
))]
compile_error!("application must not depend on adapters/framework crates");

pub mod diff;
pub mod error;
pub mod infrastructure_config;
pub mod monitor;
pub mod ports;
pub mod project;
pub mod scheduler;
