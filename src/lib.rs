// Library exports for cydash

pub mod chart;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod layout;
pub mod render;
pub mod session;
pub mod trigger;

pub use chart::{ChartBody, ChartSpec};
pub use config::{ChartKind, DashboardConfig, FilterSpec, VisualizationSpec};
pub use data::Dataset;
pub use engine::{Engine, Reconciliation};
pub use error::{ChartBuildError, ConfigError, DataLoadError};
pub use filter::FilterState;
pub use render::RenderOptions;
pub use session::Session;
pub use trigger::{ClickPayload, ClickPoint, TriggerEvent};
