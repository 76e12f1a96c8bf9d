//! Stream reader for chat completion responses
//!
//! Consumes the model server's response body as an unstructured byte feed,
//! frames it into newline-delimited JSON records and yields the content
//! delta of each record in order.

mod framing;
mod reader;

#[cfg(test)]
mod proptests;

pub use framing::RecordFramer;
pub use reader::{deltas, parse_record, StreamError, StreamItem};
