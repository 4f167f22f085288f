use ic_core::Family;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddrError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid prefix length in '{0}'")]
    InvalidPrefix(String),

    #[error("host '{0}' does not exist (NXDOMAIN)")]
    NxDomain(String),

    #[error("dns lookup for '{name}' failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: hickory_resolver::ResolveError,
    },

    #[error("'{0}' is neither an address nor a resolvable host name")]
    Unresolvable(String),

    #[error("'{token}' is not an {family} address")]
    FamilyMismatch { token: String, family: Family },

    #[error("'{token}' has no {family} addresses")]
    NoAddresses { token: String, family: Family },

    #[error("'{0}' is not in the hosts table and DNS lookups are disabled")]
    Offline(String),

    #[error("failed to start dns runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("dns resolver setup failed: {0}")]
    Setup(String),
}
