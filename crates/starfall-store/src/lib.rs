pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use config::{
    CONFIG_FILE, DB_FILE, DEFAULT_CONFIG, MapConfig, StarfallConfig, default_base_dir,
    resolve_base_dir,
};
pub use error::{Result, StoreError};
pub use store::Store;
