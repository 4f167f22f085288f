use crate::error::AddrError;
use hickory_resolver::Resolver;
use hickory_resolver::name_server::TokioConnectionProvider;
use ic_core::Family;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tokio::runtime::Runtime;
use tracing::debug;

/// A source of A/AAAA answers.
pub trait Lookup {
    /// Addresses of `family` for `name`, in answer order.
    ///
    /// An existing name without records of that family yields an empty list.
    fn lookup(&self, name: &str, family: Family) -> Result<Vec<IpAddr>, AddrError>;
}

/// Blocking DNS lookups through hickory on a private current-thread runtime.
pub struct DnsLookup {
    runtime: Runtime,
    resolver: Resolver<TokioConnectionProvider>,
}

impl DnsLookup {
    /// Build a resolver from the system configuration (`/etc/resolv.conf`).
    ///
    /// `attempts` is the resolver's own retry count per query.
    pub fn from_system_conf(attempts: usize) -> Result<Self, AddrError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let resolver = {
            let _guard = runtime.enter();
            let mut builder = Resolver::builder_tokio()
                .map_err(|e| AddrError::Setup(format!("system config: {e}")))?;
            builder.options_mut().attempts = attempts;
            builder.build()
        };

        Ok(Self { runtime, resolver })
    }
}

impl Lookup for DnsLookup {
    fn lookup(&self, name: &str, family: Family) -> Result<Vec<IpAddr>, AddrError> {
        let answer = match family {
            Family::Ipv4 => self
                .runtime
                .block_on(self.resolver.ipv4_lookup(name))
                .map(|found| found.iter().map(|a| IpAddr::V4(a.0)).collect::<Vec<_>>()),
            Family::Ipv6 => self
                .runtime
                .block_on(self.resolver.ipv6_lookup(name))
                .map(|found| found.iter().map(|a| IpAddr::V6(a.0)).collect::<Vec<_>>()),
        };

        match answer {
            Ok(addrs) => {
                debug!(host = %name, %family, count = addrs.len(), "dns resolved");
                Ok(addrs)
            }
            Err(e) if e.is_nx_domain() => Err(AddrError::NxDomain(name.to_string())),
            Err(e) if e.is_no_records_found() => {
                debug!(host = %name, %family, "no records of this family");
                Ok(Vec::new())
            }
            Err(source) => Err(AddrError::Lookup {
                name: name.to_string(),
                source,
            }),
        }
    }
}

/// Fixed name table, used for the configured `hosts` and for offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    hosts: BTreeMap<String, Vec<IpAddr>>,
}

impl StaticLookup {
    pub fn new(hosts: BTreeMap<String, Vec<IpAddr>>) -> Self {
        Self { hosts }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, addrs: Vec<IpAddr>) {
        self.hosts.insert(name.into(), addrs);
    }
}

impl Lookup for StaticLookup {
    fn lookup(&self, name: &str, family: Family) -> Result<Vec<IpAddr>, AddrError> {
        let addrs = self
            .hosts
            .get(name)
            .ok_or_else(|| AddrError::Offline(name.to_string()))?;
        Ok(addrs
            .iter()
            .copied()
            .filter(|addr| match family {
                Family::Ipv4 => addr.is_ipv4(),
                Family::Ipv6 => addr.is_ipv6(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_lookup_filters_by_family() {
        let mut hosts = StaticLookup::default();
        hosts.insert(
            "gw.example.net",
            vec!["192.0.2.1".parse().unwrap(), "2001:db8::1".parse().unwrap()],
        );

        let v4 = hosts.lookup("gw.example.net", Family::Ipv4).unwrap();
        assert_eq!(v4, vec!["192.0.2.1".parse::<IpAddr>().unwrap()]);
        let v6 = hosts.lookup("gw.example.net", Family::Ipv6).unwrap();
        assert_eq!(v6.len(), 1);
        assert!(v6[0].is_ipv6());
    }

    #[test]
    fn static_lookup_rejects_unknown_names() {
        let hosts = StaticLookup::default();
        assert!(matches!(
            hosts.lookup("missing.example", Family::Ipv4),
            Err(AddrError::Offline(_))
        ));
    }
}
