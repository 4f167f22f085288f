use crate::cidr::{canonicalize, to_cidr};
use crate::classify::{AddrClass, classify, parse_literal, parse_prefix, split_prefix};
use crate::error::AddrError;
use crate::lookup::{DnsLookup, Lookup, StaticLookup};
use ic_core::{Family, Settings};
use ipnet::IpNet;
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Remember answers for the lifetime of the resolver (one run).
    pub cache: bool,
    pub warn_round_robin: bool,
    pub warn_host_bits: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            cache: false,
            warn_round_robin: true,
            warn_host_bits: true,
        }
    }
}

impl From<&Settings> for ResolverOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            cache: settings.dns.cache,
            warn_round_robin: settings.diagnostics.warn_round_robin,
            warn_host_bits: settings.diagnostics.warn_host_bits,
        }
    }
}

/// Address resolver shared by the expander and the applier of one run.
///
/// Names are looked up in the static hosts table first and then, unless the
/// run is offline, through DNS.
pub struct AddressResolver {
    hosts: StaticLookup,
    backend: Option<Box<dyn Lookup>>,
    options: ResolverOptions,
    cache: RefCell<HashMap<(String, Family), Vec<IpAddr>>>,
}

impl AddressResolver {
    pub fn new(hosts: StaticLookup, backend: Option<Box<dyn Lookup>>, options: ResolverOptions) -> Self {
        Self {
            hosts,
            backend,
            options,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// A resolver that never leaves the hosts table.
    pub fn offline(hosts: StaticLookup) -> Self {
        Self::new(hosts, None, ResolverOptions::default())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AddrError> {
        let hosts = StaticLookup::new(settings.hosts.clone());
        let backend: Option<Box<dyn Lookup>> = if settings.dns.offline {
            None
        } else {
            Some(Box::new(DnsLookup::from_system_conf(settings.dns.attempts)?))
        };
        Ok(Self::new(hosts, backend, ResolverOptions::from(settings)))
    }

    pub fn classify(&self, token: &str) -> AddrClass {
        classify(token)
    }

    /// Look up `name` for one family.
    ///
    /// An empty list means the name exists without records of that family.
    pub fn resolve(&self, name: &str, family: Family) -> Result<Vec<IpAddr>, AddrError> {
        let key = (name.to_string(), family);
        if self.options.cache {
            if let Some(addrs) = self.cache.borrow().get(&key) {
                return Ok(addrs.clone());
            }
        }

        let addrs = if self.hosts.contains(name) {
            self.hosts.lookup(name, family)?
        } else {
            match &self.backend {
                Some(backend) => backend.lookup(name, family)?,
                None => return Err(AddrError::Offline(name.to_string())),
            }
        };

        if addrs.len() > 1 && self.options.warn_round_robin {
            warn!(
                host = %name,
                %family,
                count = addrs.len(),
                "host name resolves to several addresses; one rule is generated per address"
            );
        }

        if self.options.cache {
            self.cache.borrow_mut().insert(key, addrs.clone());
        }
        Ok(addrs)
    }

    /// Families a single address token belongs to.
    ///
    /// Literals belong to their own family; names to every family they have
    /// records for. A name with no records at all is fatal.
    pub fn families(&self, token: &str) -> Result<Vec<Family>, AddrError> {
        if let Some(net) = parse_literal(token)? {
            return Ok(vec![family_of_net(&net)]);
        }

        let (host, _) = split_prefix(token);
        let mut families = Vec::new();
        for family in Family::ALL {
            if !self.resolve(host, family)?.is_empty() {
                families.push(family);
            }
        }

        if families.is_empty() {
            return Err(AddrError::Unresolvable(token.to_string()));
        }
        debug!(token = %token, ?families, "classified address token");
        Ok(families)
    }

    /// Expand one token to the CIDR entries it stands for in `family`.
    ///
    /// Host bits are always masked off, as the kernel stores the network.
    /// A name may carry a prefix, which is applied to each of its addresses.
    pub fn expand(&self, token: &str, family: Family) -> Result<Vec<IpNet>, AddrError> {
        if let Some(net) = parse_literal(token)? {
            if family_of_net(&net) != family {
                return Err(AddrError::FamilyMismatch {
                    token: token.to_string(),
                    family,
                });
            }
            return Ok(vec![canonicalize(net, self.options.warn_host_bits, true)]);
        }

        let (host, prefix) = split_prefix(token);
        if host.is_empty() {
            return Err(AddrError::InvalidAddress(token.to_string()));
        }
        let prefix_len = match prefix {
            Some(prefix) => parse_prefix(prefix, family)
                .ok_or_else(|| AddrError::InvalidPrefix(token.to_string()))?,
            None => family.max_prefix(),
        };

        let addresses: Vec<String> = self
            .resolve(host, family)?
            .into_iter()
            .map(|addr| format!("{addr}/{prefix_len}"))
            .collect();
        to_cidr(&addresses, false, true)
    }

    /// Expand a comma-separated address list for `family`.
    ///
    /// Individual names may contribute nothing; the list as a whole may not.
    pub fn expand_list(&self, list: &str, family: Family) -> Result<Vec<IpNet>, AddrError> {
        let mut nets = Vec::new();
        for token in list.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(AddrError::InvalidAddress(list.to_string()));
            }
            nets.extend(self.expand(token, family)?);
        }

        if nets.is_empty() {
            return Err(AddrError::NoAddresses {
                token: list.to_string(),
                family,
            });
        }
        Ok(nets)
    }
}

fn family_of_net(net: &IpNet) -> Family {
    match net {
        IpNet::V4(_) => Family::Ipv4,
        IpNet::V6(_) => Family::Ipv6,
    }
}
