//! Native structured persistence format.
//!
//! An XML document whose root carries the session's dive sites followed by
//! its dives (cylinders, dive-computer records, samples). All numeric
//! attributes are the model's canonical integer milli-units, so
//! parse(serialize(T)) reproduces T exactly; absent fields are omitted from
//! the output entirely, never written as zero or empty placeholders.

mod parser;
mod writer;

pub use parser::{parse_native, parse_native_into};
pub use writer::{save_native, write_native};

/// Root element name; also the detector's native-format signature.
pub(crate) const ROOT: &str = "divelog";
