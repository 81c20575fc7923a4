//! Local persistence: SQLite store, schema migrations, config, and paths.

pub mod config;
pub mod paths;
pub mod schema;
pub mod store;

pub use config::Settings;
pub use paths::AppPaths;
pub use store::Store;
