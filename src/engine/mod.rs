//! Engine module - the DOE transaction state machine.
//!
//! - [`DoeMailbox`] - abort, load, GO, bounded ready poll
//! - [`ResponseReader`] - read/ack draining with the final-dword check
//! - [`SharedMailbox`] - mutex-serialized access from several threads
//! - register offsets and status bits

mod mailbox;
mod reader;
mod registers;
mod shared;

pub use mailbox::{DoeMailbox, MailboxBuilder};
pub use reader::ResponseReader;
pub use registers::{control, status, DoeRegisters, DoeStatus, DEFAULT_DOE_BASE, MAX_DOE_BASE};
pub use shared::SharedMailbox;
