//! charmctl core library: domain types, control-plane contract, errors, settings.
//!
//! - [`types`]: desired and observed application state
//! - [`base`], [`channel`], [`charm`]: parsing of bases, channels, charm references
//! - [`api`]: the collaborator traits the reconciler drives
//! - [`error`]: [`ErrorKind`] taxonomy and the error classification table
//! - [`settings`]: load / save of `~/.charmctl/settings.yaml`

pub mod api;
pub mod base;
pub mod channel;
pub mod charm;
pub mod error;
pub mod settings;
pub mod types;

pub use base::Base;
pub use channel::{Channel, Risk};
pub use charm::{CharmId, CharmUrl, Origin, Platform};
pub use error::{classify, ApiError, CoreError, ErrorKind, SettingsError};
pub use settings::{RetrySettings, Settings};
pub use types::{
    ApplicationDelta, ApplicationName, ConfigEntry, ConfigValue, CreatedApplication,
    DesiredApplication, ExposeSpec, ModelName, ModelType, ObservedApplication, PackageRef,
    PendingResource, ResourceMeta, ResourceSource, ResourceType,
};
