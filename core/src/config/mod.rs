pub mod load;
pub mod types;

pub use load::{apply_env_overrides, get_gator_data_dir, load_default, load_from_path};
pub use types::{
    AppConfig, BackendConfig, LoggingConfig, RetryConfig, SitesConfig, StoreConfig, TabsConfig,
};
