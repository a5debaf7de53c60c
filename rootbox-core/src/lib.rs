//! rootbox core: device operations and the flashable zip installer built on
//! the two-pool scheduler.

pub mod config;
pub mod events;
pub mod flash;
pub mod logging;
pub mod ops;
pub mod runtime;
pub mod source;
pub mod staging;
pub mod state;
pub mod validator;

#[cfg(test)]
mod test_env;

pub use config::Config;
pub use events::{Event, Events};
pub use flash::{FlashOutcome, FlashRequest, Flasher, Notice, Notifier};
pub use ops::Ops;
pub use runtime::Rootbox;
pub use source::{ContentResolver, FileResolver, SourceHandle};
