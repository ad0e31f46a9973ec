//! Dockwright Docker image tasks
//!
//! This crate provides the Docker operations that need registry
//! authentication: building images (with credentials for every registry a
//! multi-stage Dockerfile may pull from), pushing and pulling images, plus the
//! image-ID files used for up-to-date checks.

pub mod builder;
pub mod context;
pub mod error;
pub mod id_file;
pub mod path;
pub mod puller;
pub mod pusher;

pub use builder::{BuildRequest, ImageBuilder};
pub use context::{BuildContext, ContextBuilder};
pub use error::{BuildError, BuildResult};
pub use path::ResolvablePath;
pub use puller::ImagePuller;
pub use pusher::{ImagePusher, split_image_tag};
