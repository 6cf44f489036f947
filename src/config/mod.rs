// configuration module public api

pub mod types;
pub mod loading;

pub use types::*;
pub use loading::{load_config_from_file, load_configuration, ENV_PREFIX};
