//! Text helpers for rendering records in a terminal.
//!
//! ```
//! use clipfeed::util::{display_width, preview};
//!
//! assert_eq!(display_width("Hello 世界"), 10);
//! assert_eq!(preview("line one\nline two", 12), "line one ...");
//! ```

mod text;

pub use text::{display_width, human_size, preview, truncate_to_width};
