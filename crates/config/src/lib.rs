//! Settings for camper: environment lookup, defaults and on-disk locations.

pub mod env;
pub mod paths;
pub mod settings;

pub use {
    env::{Env, vars},
    paths::{config_dir, token_file_path},
    settings::Settings,
};
