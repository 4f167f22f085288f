use ic_addr::AddrError;
use ic_core::Family;
use ic_parse::{ExpandError, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("no command given (expected one of -A, -I, -F, -N, -X, -P, ...)")]
    NoCommand,

    #[error("only one command per line, got {}", .0.join(", "))]
    MultipleCommands(Vec<String>),

    #[error("{line} command line applied to the {ruleset} rule set")]
    FamilyMismatch { line: Family, ruleset: Family },

    #[error("unknown table '{0}' (expected filter or raw)")]
    UnknownTable(String),

    #[error("chain '{chain}' does not exist in table {table}")]
    UnknownChain { table: String, chain: String },

    #[error("chain '{chain}' already exists in table {table}")]
    ChainExists { table: String, chain: String },

    #[error("invalid chain name '{name}': {reason}")]
    InvalidChainName { name: String, reason: String },

    #[error("chain '{chain}' in table {table} is not empty")]
    ChainNotEmpty { table: String, chain: String },

    #[error("cannot delete built-in chain '{0}'")]
    CannotDeleteBuiltin(String),

    #[error("'{chain}' is not a built-in chain of table {table}; only built-in chains have a policy")]
    NotBuiltinChain { table: String, chain: String },

    #[error("invalid policy '{0}' (expected ACCEPT, DROP, QUEUE or RETURN)")]
    InvalidPolicy(String),

    #[error("invalid rule position '{position}' for chain '{chain}' holding {len} rule(s)")]
    InvalidPosition {
        chain: String,
        position: String,
        len: usize,
    },

    #[error("'!' cannot be applied to the address list '{0}'")]
    NegatedList(String),

    #[error("option '{option}' is not allowed with {command}")]
    IllegalOption { command: String, option: String },

    #[error("{0} is not implemented")]
    Unimplemented(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Address(#[from] AddrError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error("{family} line {number}: {line}: {source}")]
    Line {
        family: Family,
        number: usize,
        line: String,
        #[source]
        source: ApplyError,
    },
}

#[derive(Debug, Error)]
#[error("dump line {number}: {reason}: {line}")]
pub struct DumpError {
    pub number: usize,
    pub line: String,
    pub reason: String,
}

impl DumpError {
    pub(crate) fn new(number: usize, line: &str, reason: impl Into<String>) -> Self {
        Self {
            number,
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
