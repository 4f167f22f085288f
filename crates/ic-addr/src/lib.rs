//! Address classification, name resolution and CIDR canonicalization.
//!
//! Shared by the macro expander (to decide which family a dual-stack line
//! belongs to) and the rule applier (to fan a rule out per address).

pub mod cidr;
pub mod classify;
pub mod error;
pub mod lookup;
pub mod resolver;

pub use cidr::{canonicalize, to_cidr};
pub use classify::{AddrClass, classify, parse_literal};
pub use error::AddrError;
pub use lookup::{DnsLookup, Lookup, StaticLookup};
pub use resolver::{AddressResolver, ResolverOptions};

#[cfg(test)]
pub(crate) mod test_support;
