use crate::classify::parse_literal;
use crate::error::AddrError;
use ipnet::IpNet;
use tracing::warn;

/// Canonicalize a batch of literal addresses to CIDR form.
///
/// The result has the same length and order as the input. A missing prefix
/// means a host route. With `verify` a diagnostic is logged for every
/// address that is not its own network base; `reduce_to_network` replaces
/// each entry with its containing network. One unparseable entry fails the
/// whole batch.
pub fn to_cidr<S: AsRef<str>>(
    addresses: &[S],
    verify: bool,
    reduce_to_network: bool,
) -> Result<Vec<IpNet>, AddrError> {
    addresses
        .iter()
        .map(|address| {
            let address = address.as_ref();
            let net = parse_literal(address)?
                .ok_or_else(|| AddrError::InvalidAddress(address.to_string()))?;
            Ok(canonicalize(net, verify, reduce_to_network))
        })
        .collect()
}

pub fn canonicalize(net: IpNet, verify: bool, reduce_to_network: bool) -> IpNet {
    let network = net.trunc();
    if verify && network != net {
        warn!(address = %net, network = %network, "address has host bits set beyond its prefix");
    }
    if reduce_to_network { network } else { net }
}
