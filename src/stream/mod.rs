//! The response-stream translation pipeline: raw bytes from the backend are
//! split into event lines, decoded into payload strings, parsed into
//! cumulative assistant text, and diffed into outgoing chunks.

mod delta;
mod lines;

pub use delta::{DeltaExtractor, DeltaTracker};
pub use lines::{decode_event_line, event_payload_stream, LineSplitter, DONE_LINE, EVENT_PREFIX};
