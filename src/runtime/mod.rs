// ABOUTME: Container runtime access over SSH: detection, command lines, output parsing.
// ABOUTME: Parsing lives here so every other module sees typed records only.

mod commands;
mod detection;
pub mod parse;
mod types;

pub use commands::{ContainerCli, LIST_FORMAT, quote, remove_file, stat_size};
pub use detection::{DetectionError, detect_runtime};
pub use parse::{Listing, ParseError, parse_listing};
pub use types::RuntimeType;
