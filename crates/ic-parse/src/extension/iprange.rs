use super::{Extension, Options, emit};
use crate::error::ParseError;
use ic_addr::classify::family_of;
use ic_core::Family;
use std::net::IpAddr;

pub(crate) struct IpRange;

impl Extension for IpRange {
    fn name(&self) -> &'static str {
        "iprange"
    }

    fn parse(&self, family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut src = None;
        let mut dst = None;
        while let Some((negated, name)) = opts.next(&["src-range", "dst-range"]) {
            opts.once(name)?;
            let range = parse_range(family, name, opts.value(name)?)?;
            if name == "src-range" {
                src = Some((negated, range));
            } else {
                dst = Some((negated, range));
            }
        }
        opts.finish(cursor);

        if src.is_none() && dst.is_none() {
            return Err(ParseError::invalid("-m iprange", "", "--src-range or --dst-range is required"));
        }
        let mut out = vec!["iprange".to_string()];
        for (option, range) in [("src-range", src), ("dst-range", dst)] {
            if let Some((negated, range)) = range {
                emit(&mut out, negated, option, Some(&range));
            }
        }
        Ok(out)
    }
}

/// `from[-to]`, both addresses of `family`; a single address is its own range.
fn parse_range(family: Family, option: &str, raw: &str) -> Result<String, ParseError> {
    let option = format!("--{option}");
    let (from, to) = raw.split_once('-').unwrap_or((raw, raw));
    let mut bounds = Vec::with_capacity(2);
    for part in [from, to] {
        let addr: IpAddr = part
            .parse()
            .map_err(|_| ParseError::invalid(&option, raw, format!("'{part}' is not an address")))?;
        if family_of(&addr) != family {
            return Err(ParseError::WrongFamily {
                option: format!("{option} {raw}"),
                family,
            });
        }
        bounds.push(addr);
    }
    if bounds[0] > bounds[1] {
        return Err(ParseError::invalid(&option, raw, "range start exceeds its end"));
    }
    Ok(format!("{}-{}", bounds[0], bounds[1]))
}
