//! Rule-set model, command application and canonical dump output.

pub mod apply;
pub mod diff;
pub mod dump;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod render;

pub use apply::Applier;
pub use diff::{DumpDiff, diff_dump, normalize_dump};
pub use dump::dump_to_commands;
pub use error::{ApplyError, DumpError, PipelineError};
pub use model::{Policy, Rule, RuleSet, Table, TableKind};
pub use pipeline::{Pipeline, Rendered};
pub use render::{render, render_rule};
