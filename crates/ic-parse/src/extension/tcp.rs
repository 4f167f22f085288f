use super::ports::port_range;
use super::{Extension, Options, emit, parse_number};
use crate::error::ParseError;
use ic_core::Family;

const TCP_OPTIONS: &[&str] = &[
    "sport",
    "source-port",
    "dport",
    "destination-port",
    "tcp-option",
    "tcp-flags",
    "syn",
];

const UDP_OPTIONS: &[&str] = &["sport", "source-port", "dport", "destination-port"];

/// Output order of TCP flag names, independent of input order.
const FLAG_ORDER: &[&str] = &["FIN", "SYN", "RST", "PSH", "ACK", "URG", "ALL", "NONE"];

type Negatable = Option<(bool, Vec<String>)>;

pub(crate) struct Tcp;
pub(crate) struct Udp;

impl Extension for Tcp {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut ports = PortOptions::default();
        let mut tcp_option: Negatable = None;
        let mut flags: Negatable = None;

        while let Some((negated, name)) = opts.next(TCP_OPTIONS) {
            match name {
                "tcp-option" => {
                    opts.once("tcp-option")?;
                    let raw = opts.value(name)?;
                    let number: u8 = parse_number("--tcp-option", raw)?;
                    tcp_option = Some((negated, vec![number.to_string()]));
                }
                "tcp-flags" => {
                    opts.once("tcp-flags")?;
                    let mask = sort_flags(opts.value(name)?)?;
                    let comparison = sort_flags(opts.value(name)?)?;
                    flags = Some((negated, vec![mask, comparison]));
                }
                "syn" => {
                    opts.once("tcp-flags")?;
                    flags = Some((negated, vec!["FIN,SYN,RST,ACK".into(), "SYN".into()]));
                }
                _ => ports.take(&mut opts, negated, name)?,
            }
        }
        opts.finish(cursor);

        let mut out = vec!["tcp".to_string()];
        ports.render(&mut out);
        for (option, value) in [("tcp-option", tcp_option), ("tcp-flags", flags)] {
            if let Some((negated, values)) = value {
                emit(&mut out, negated, option, None);
                out.extend(values);
            }
        }
        Ok(out)
    }
}

impl Extension for Udp {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut ports = PortOptions::default();
        while let Some((negated, name)) = opts.next(UDP_OPTIONS) {
            ports.take(&mut opts, negated, name)?;
        }
        opts.finish(cursor);

        let mut out = vec!["udp".to_string()];
        ports.render(&mut out);
        Ok(out)
    }
}

#[derive(Default)]
struct PortOptions {
    sport: Option<(bool, String)>,
    dport: Option<(bool, String)>,
}

impl PortOptions {
    fn take<'t>(&mut self, opts: &mut Options<'t>, negated: bool, name: &'t str) -> Result<(), ParseError> {
        let (canonical, slot) = match name {
            "sport" | "source-port" => ("sport", &mut self.sport),
            "dport" | "destination-port" => ("dport", &mut self.dport),
            other => return Err(ParseError::UnknownParameter(format!("--{other}"))),
        };
        opts.once(canonical)?;
        let raw = opts.value(name)?;
        *slot = match port_range(&format!("--{canonical}"), raw)? {
            Some(range) => Some((negated, range)),
            None if negated => Some((true, "0:65535".to_string())),
            None => None,
        };
        Ok(())
    }

    fn render(self, out: &mut Vec<String>) {
        for (option, value) in [("sport", self.sport), ("dport", self.dport)] {
            if let Some((negated, range)) = value {
                emit(out, negated, option, Some(&range));
            }
        }
    }
}

fn sort_flags(raw: &str) -> Result<String, ParseError> {
    let mut indices = Vec::new();
    for name in raw.split(',') {
        let upper = name.trim().to_ascii_uppercase();
        let index = FLAG_ORDER
            .iter()
            .position(|flag| *flag == upper)
            .ok_or_else(|| ParseError::invalid("--tcp-flags", raw, format!("unknown flag '{name}'")))?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices
        .into_iter()
        .map(|index| FLAG_ORDER[index])
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::test_support::run;

    #[test]
    fn ports_render_in_fixed_order() {
        let (args, cursor) = run(&Tcp, Family::Ipv4, "--dport ssh --sport 1024: -j ACCEPT").unwrap();
        assert_eq!(args, "tcp --sport 1024:65535 --dport 22");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn full_port_range_is_dropped() {
        let (args, _) = run(&Udp, Family::Ipv6, "--destination-port 0:65535").unwrap();
        assert_eq!(args, "udp");
    }

    #[test]
    fn tcp_flags_sort_mask_and_comparison_independently() {
        let (a, _) = run(&Tcp, Family::Ipv4, "--tcp-flags ACK,SYN,FIN,RST SYN").unwrap();
        let (b, _) = run(&Tcp, Family::Ipv4, "--tcp-flags rst,fin,syn,ack syn").unwrap();
        assert_eq!(a, "tcp --tcp-flags FIN,SYN,RST,ACK SYN");
        assert_eq!(a, b);

        let (c, _) = run(&Tcp, Family::Ipv4, "! --tcp-flags NONE,URG,ALL ACK,FIN").unwrap();
        assert_eq!(c, "tcp ! --tcp-flags URG,ALL,NONE FIN,ACK");
    }

    #[test]
    fn syn_is_shorthand_for_tcp_flags() {
        let (args, _) = run(&Tcp, Family::Ipv4, "! --syn").unwrap();
        assert_eq!(args, "tcp ! --tcp-flags FIN,SYN,RST,ACK SYN");
        assert!(matches!(
            run(&Tcp, Family::Ipv4, "--syn --tcp-flags ALL NONE"),
            Err(ParseError::DuplicateParameter(_))
        ));
    }

    #[test]
    fn negated_ports_and_options() {
        let (args, _) = run(&Tcp, Family::Ipv4, "! --dport 80 --tcp-option 8").unwrap();
        assert_eq!(args, "tcp ! --dport 80 --tcp-option 8");
    }

    #[test]
    fn udp_ignores_tcp_only_options() {
        let (args, cursor) = run(&Udp, Family::Ipv4, "--dport 53 --syn").unwrap();
        assert_eq!(args, "udp --dport 53");
        assert_eq!(cursor, 2);
    }
}
