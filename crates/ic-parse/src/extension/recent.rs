use super::{Extension, Options, emit, not_negatable, parse_number};
use crate::error::ParseError;
use ic_core::Family;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const RECENT_OPTIONS: &[&str] = &[
    "set", "rcheck", "update", "remove", "seconds", "reap", "hitcount", "rttl", "name", "mask",
    "rsource", "rdest",
];

const COMMANDS: &[&str] = &["set", "rcheck", "update", "remove"];

pub(crate) struct Recent;

impl Extension for Recent {
    fn name(&self) -> &'static str {
        "recent"
    }

    fn parse(&self, family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut command: Option<(bool, &str)> = None;
        let mut seconds: Option<u32> = None;
        let mut reap = false;
        let mut hitcount: Option<u32> = None;
        let mut rttl = false;
        let mut list = "DEFAULT".to_string();
        let mut mask = full_mask(family);
        let mut side = "rsource";

        while let Some((negated, name)) = opts.next(RECENT_OPTIONS) {
            if COMMANDS.contains(&name) {
                if let Some((_, previous)) = command {
                    return Err(ParseError::invalid(
                        &format!("--{name}"),
                        "",
                        format!("only one of --set, --rcheck, --update or --remove (already --{previous})"),
                    ));
                }
                command = Some((negated, name));
                continue;
            }

            not_negatable(negated, name)?;
            match name {
                "seconds" => {
                    opts.once(name)?;
                    seconds = Some(positive("--seconds", opts.value(name)?)?);
                }
                "hitcount" => {
                    opts.once(name)?;
                    hitcount = Some(positive("--hitcount", opts.value(name)?)?);
                }
                "reap" => reap = true,
                "rttl" => rttl = true,
                "name" => {
                    opts.once(name)?;
                    let raw = opts.value(name)?;
                    if raw.is_empty() || raw.len() > 200 {
                        return Err(ParseError::invalid("--name", raw, "name must be 1 to 200 characters"));
                    }
                    list = raw.to_string();
                }
                "mask" => {
                    opts.once(name)?;
                    mask = parse_mask(family, opts.value(name)?)?;
                }
                "rdest" => side = "rdest",
                _ => side = "rsource",
            }
        }
        opts.finish(cursor);

        let (negated, command) = command.ok_or_else(|| {
            ParseError::invalid("-m recent", "", "one of --set, --rcheck, --update or --remove is required")
        })?;
        let checks = matches!(command, "rcheck" | "update");
        if !checks {
            for (present, option) in [
                (seconds.is_some(), "--seconds"),
                (hitcount.is_some(), "--hitcount"),
                (rttl, "--rttl"),
            ] {
                if present {
                    return Err(ParseError::invalid(option, "", "only valid with --rcheck or --update"));
                }
            }
        }
        if reap && seconds.is_none() {
            return Err(ParseError::invalid("--reap", "", "requires --seconds"));
        }

        let mut out = vec!["recent".to_string()];
        emit(&mut out, negated, command, None);
        if let Some(seconds) = seconds {
            emit(&mut out, false, "seconds", Some(&seconds.to_string()));
        }
        if reap {
            emit(&mut out, false, "reap", None);
        }
        if let Some(hitcount) = hitcount {
            emit(&mut out, false, "hitcount", Some(&hitcount.to_string()));
        }
        if rttl {
            emit(&mut out, false, "rttl", None);
        }
        emit(&mut out, false, "name", Some(&list));
        emit(&mut out, false, "mask", Some(&mask.to_string()));
        emit(&mut out, false, side, None);
        Ok(out)
    }
}

fn positive(option: &str, raw: &str) -> Result<u32, ParseError> {
    let value: u32 = parse_number(option, raw)?;
    if value == 0 {
        return Err(ParseError::invalid(option, raw, "must be positive"));
    }
    Ok(value)
}

fn full_mask(family: Family) -> IpAddr {
    match family {
        Family::Ipv4 => IpAddr::V4(Ipv4Addr::BROADCAST),
        Family::Ipv6 => IpAddr::V6(Ipv6Addr::from(u128::MAX)),
    }
}

fn parse_mask(family: Family, raw: &str) -> Result<IpAddr, ParseError> {
    let mask: IpAddr = raw
        .parse()
        .map_err(|_| ParseError::invalid("--mask", raw, "not an address"))?;
    if ic_addr::classify::family_of(&mask) != family {
        return Err(ParseError::WrongFamily {
            option: format!("--mask {raw}"),
            family,
        });
    }
    Ok(mask)
}
