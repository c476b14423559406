//! Debug adapter that presents a World of Warcraft addon crash dump as a
//! session paused on the exception.

pub mod config;
pub mod dap;
pub mod debugger;
pub mod error;
pub mod logging;
pub mod parser;

pub use config::{ErrorType, SessionConfig};
pub use error::{CrashError, SessionError};
pub use parser::{parse_crash, CrashInfo, FrameInfo, Value};
