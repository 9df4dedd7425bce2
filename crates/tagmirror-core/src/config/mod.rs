//! Configuration management

mod loader;
mod types;

pub use types::{
    BuildConfig, FilterConfig, MirrorConfig, TagSourceKind, TargetsConfig, UpstreamConfig,
};
