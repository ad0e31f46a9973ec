//! Dockwright registry authentication
//!
//! This crate resolves credentials for container image registries the same
//! way the Docker CLI does: build-declared credentials first, then the
//! `auths` section of `config.json`, per-registry credential helpers
//! (`credHelpers`) and finally the global credential store (`credsStore`).

pub mod config;
pub mod error;
pub mod helper;
pub mod locator;
pub mod model;
pub mod reference;

pub use config::{DockerConfigFile, default_config_path};
pub use error::{AuthError, LookupFailure, Result};
pub use helper::{
    CommandOutput, CommandRunner, CredentialHelper, CredentialReply, DEFAULT_HELPER_PREFIX,
    DEFAULT_HELPER_SUFFIX, SystemCommandRunner,
};
pub use locator::RegistryAuthLocator;
pub use model::{AuthConfig, DEFAULT_REGISTRY_URL, RegistryCredentials, build_credentials};
