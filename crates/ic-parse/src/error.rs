use ic_addr::AddrError;
use ic_core::Family;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty command line")]
    Empty,

    #[error("unterminated quote in command line")]
    UnbalancedQuote,

    #[error("unknown command '{0}' (expected iptables or ip6tables)")]
    UnknownCommand(String),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("unknown extension '{0}'")]
    UnknownExtension(String),

    #[error("target '{target}' is followed by option '{option}' but no such target extension is registered")]
    MissingExtension { target: String, option: String },

    #[error("option '{0}' requires an argument")]
    MissingArgument(String),

    #[error("option '{0}' given more than once")]
    DuplicateParameter(String),

    #[error("'!' is not allowed before '{0}'")]
    NegationNotAllowed(String),

    #[error("'!' given twice in a row")]
    DoubleNegation,

    #[error("trailing '!' with nothing to negate")]
    TrailingNegation,

    #[error("option '{flag}' expects {expected} argument(s), got {found}")]
    Arity {
        flag: String,
        expected: String,
        found: usize,
    },

    #[error("invalid value '{value}' for '{option}': {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("'{option}' is not available for {family}")]
    WrongFamily { option: String, family: Family },

    #[error("{0} is not implemented")]
    Unimplemented(String),

    #[error("unknown macro '{0}'")]
    UnknownMacro(String),

    #[error("macro '{name}' expects {expected}")]
    MacroArity { name: String, expected: &'static str },

    #[error(transparent)]
    Address(#[from] AddrError),
}

impl ParseError {
    pub fn invalid(option: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            option: option.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
