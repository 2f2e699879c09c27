//! Row-iterator client driver for flatbase's HTTP query protocol.
//!
//! [`Client::connect`] is the sole entry point: it authenticates, binds
//! the session to one database, and returns a handle whose [`Client::execute`]
//! submits SELECT statements and returns a [`Cursor`] that pulls rows one
//! at a time off a spilled copy of the streamed response.

mod client;
mod cursor;
mod error;
mod row_reader;

pub use client::Client;
pub use cursor::Cursor;
pub use error::{ClientError, ClientResult};
