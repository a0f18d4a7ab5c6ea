// Shared utilities: the labeled buffer, text encodings and file collaborators

pub mod buffer;
pub mod encoding;
pub mod io;

pub use buffer::{Field, Label, LabeledBuffer, Occurrence, RangeReturn, Value, Whence};
pub use io::{ByteSource, ExistsPolicy, FileSource};
