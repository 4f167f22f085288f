use super::ports::parse_port;
use super::{Extension, Options, emit};
use crate::error::ParseError;
use ic_core::Family;

const MULTIPORT_OPTIONS: &[&str] = &[
    "sports",
    "source-ports",
    "dports",
    "destination-ports",
    "ports",
];

/// Kernel limit on entries; a range takes two.
const MAX_PORTS: usize = 15;

pub(crate) struct Multiport;

impl Extension for Multiport {
    fn name(&self) -> &'static str {
        "multiport"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut selected: Option<(bool, &'static str, String)> = None;

        while let Some((negated, name)) = opts.next(MULTIPORT_OPTIONS) {
            let canonical = match name {
                "sports" | "source-ports" => "sports",
                "dports" | "destination-ports" => "dports",
                _ => "ports",
            };
            if selected.is_some() {
                return Err(ParseError::invalid(
                    &format!("--{canonical}"),
                    "",
                    "multiport accepts only one of --sports, --dports or --ports",
                ));
            }
            let list = port_list(&format!("--{canonical}"), opts.value(name)?)?;
            selected = Some((negated, canonical, list));
        }
        opts.finish(cursor);

        let (negated, option, list) = selected.ok_or_else(|| {
            ParseError::invalid("-m multiport", "", "one of --sports, --dports or --ports is required")
        })?;
        let mut out = vec!["multiport".to_string()];
        emit(&mut out, negated, option, Some(&list));
        Ok(out)
    }
}

fn port_list(option: &str, raw: &str) -> Result<String, ParseError> {
    let mut entries = Vec::new();
    let mut slots = 0;
    for item in raw.split(',') {
        match item.split_once(':') {
            Some((low, high)) => {
                let low = parse_port(option, low)?;
                let high = parse_port(option, high)?;
                if low > high {
                    return Err(ParseError::invalid(option, item, "port range minimum exceeds maximum"));
                }
                slots += 2;
                entries.push(format!("{low}:{high}"));
            }
            None => {
                slots += 1;
                entries.push(parse_port(option, item)?.to_string());
            }
        }
    }

    if slots > MAX_PORTS {
        return Err(ParseError::invalid(
            option,
            raw,
            format!("too many ports ({slots} > {MAX_PORTS}, ranges count twice)"),
        ));
    }
    Ok(entries.join(","))
}
