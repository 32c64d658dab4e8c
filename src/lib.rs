mod backend;
mod config;
mod error;
mod events;
mod gate;
mod metrics;
mod relay;
mod session;
mod watches;

pub mod logging;
pub mod mock;

pub use self::config::Config;
pub use self::error::format_fail;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::error::Result;
pub use self::events::NodeEvent;
pub use self::events::NodeEventKind;
pub use self::events::NodeMeta;
pub use self::events::SessionState;
pub use self::events::WatchKind;
pub use self::metrics::register_metrics;
pub use self::session::Session;
