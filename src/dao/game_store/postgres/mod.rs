mod config;
mod error;
mod store;

#[allow(unused_imports)]
pub use config::PgConfig;
#[allow(unused_imports)]
pub use store::PgGameStore;
