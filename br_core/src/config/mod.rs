pub mod commands;
pub mod endpoint;
pub mod sizes;
pub mod timing;

pub use commands::CommandSet;
pub use endpoint::{Auth, RemoteEndpoint, Secret};
pub use sizes::{Configuration, SizeLabelError, default_configurations, parse_configurations};
pub use timing::{SamplerConfig, SettleDelays};
