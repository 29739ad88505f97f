pub mod api;
mod common;
mod config;
pub mod domain;
mod logging;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod view;

pub use api::{ApiError, GameApi, HttpApi};
pub use common::*;
pub use config::*;
pub use domain::*;
pub use logging::{init_logging, init_logging_with};
pub use protocol::{DecodeError, Message};
pub use session::{GameSession, SessionPhase, SessionState};
pub use subscription::{ChannelUpdate, Subscription};
pub use transport::{Connector, Transport};
