pub mod config;
pub mod error;
pub mod sink;
pub mod types;

pub use config::Config;
pub use error::{
    DeliveryError, Error, FetchError, ParseError, Result, ScheduleConfigError,
    SelectionConfigError,
};
pub use sink::MessageSink;
pub use types::*;
