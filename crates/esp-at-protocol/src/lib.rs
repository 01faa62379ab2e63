//! ESP-AT command protocol
//!
//! This crate drives an ESP32 WiFi co-processor running the ESP-AT firmware
//! over a UART. It turns the module's asynchronous, line-oriented output into
//! synchronous, timeout-bounded command/response transactions.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → module): ASCII lines terminated with `\r\n`
//! - **Responses** (module → host): ASCII lines terminated with `\r\n`
//! - **Markers**: `OK` and `ERROR` end most commands; `ready` is printed
//!   after a reset; informational lines carry prefixes such as `STATUS:` or
//!   `+CIPSNTPTIME:`
//!
//! # Pieces
//!
//! - [`LineBuffer`]: assembles received bytes into lines
//! - [`ResponseMatcher`]: waits for a line containing a substring, with a
//!   deadline and an optional early-failure marker
//! - [`AtSession`]: the transaction engine (`execute` / `query`)
//! - [`url::encode`]: percent-encoding for HTTP request lines
//!
//! The session is generic over a [`Transport`] and a [`Clock`], so it runs on
//! a real serial link or entirely in memory with the [`mock`] collaborators.
//!
//! # Example
//!
//! ```rust
//! use esp_at_protocol::mock::{ManualClock, ScriptedTransport};
//! use esp_at_protocol::AtSession;
//!
//! let clock = ManualClock::new();
//! let mut transport = ScriptedTransport::new(clock.clone());
//! transport.reply_to("AT+CIPSTATUS", b"STATUS:2\r\nOK\r\n");
//!
//! let mut session = AtSession::new(transport, clock);
//! session.send("AT+CIPSTATUS");
//! assert_eq!(session.query("STATUS:", 1000), "STATUS:2");
//! assert_eq!(session.query("OK", 200), "OK");
//! ```

mod codec;
mod commands;
mod error;
mod matcher;
pub mod mock;
mod responses;
mod session;
mod transport;
pub mod url;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use matcher::*;
pub use responses::*;
pub use session::*;
pub use transport::*;
