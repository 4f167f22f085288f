//! Command-line parsing for iptables/ip6tables rule definitions.
//!
//! A line is tokenized shell-style, its flags are normalized to canonical
//! long names, and match/target extensions are dispatched through a
//! [`Registry`]. The [`Expander`] turns dual-stack macro lines into
//! per-family command lines before any of that happens.

pub mod error;
pub mod expand;
pub mod extension;
pub mod flags;
pub mod params;
pub mod parser;
pub mod protocol;
pub mod tokenize;

pub use error::ParseError;
pub use expand::{ExpandError, Expander, Expansion};
pub use extension::{Extension, Registry};
pub use flags::{FlagKind, FlagSpec};
pub use params::{Fragment, ParamMap};
pub use parser::{ParsedCommand, Parser, TERMINAL_TARGETS};
pub use tokenize::tokenize;
