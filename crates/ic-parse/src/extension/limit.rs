use super::{Extension, Options, emit, not_negatable, parse_number};
use crate::error::ParseError;
use ic_core::Family;

/// Rates are stored by the kernel as a period in 1/10000ths of a second.
const SCALE: u64 = 10_000;

const UNITS: &[(&str, u64)] = &[
    ("second", SCALE),
    ("minute", SCALE * 60),
    ("hour", SCALE * 60 * 60),
    ("day", SCALE * 24 * 60 * 60),
];

const PRINTED_UNITS: &[(&str, u64)] = &[
    ("day", SCALE * 24 * 60 * 60),
    ("hour", SCALE * 60 * 60),
    ("min", SCALE * 60),
    ("sec", SCALE),
];

const DEFAULT_BURST: u32 = 5;
const DEFAULT_EXPIRE: u32 = 10_000;

const LIMIT_OPTIONS: &[&str] = &["limit", "limit-burst"];

const HASHLIMIT_OPTIONS: &[&str] = &[
    "hashlimit",
    "hashlimit-upto",
    "hashlimit-above",
    "hashlimit-burst",
    "hashlimit-mode",
    "hashlimit-srcmask",
    "hashlimit-dstmask",
    "hashlimit-name",
    "hashlimit-htable-size",
    "hashlimit-htable-max",
    "hashlimit-htable-gcinterval",
    "hashlimit-htable-expire",
];

const MODE_ORDER: &[&str] = &["srcip", "srcport", "dstip", "dstport"];

pub(crate) struct Limit;
pub(crate) struct Hashlimit;

impl Extension for Limit {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut period = parse_rate("--limit", "3/hour")?;
        let mut negated_rate = false;
        let mut burst = DEFAULT_BURST;

        while let Some((negated, name)) = opts.next(LIMIT_OPTIONS) {
            opts.once(name)?;
            let raw = opts.value(name)?;
            match name {
                "limit" => {
                    negated_rate = negated;
                    period = parse_rate("--limit", raw)?;
                }
                _ => {
                    not_negatable(negated, name)?;
                    burst = parse_burst("--limit-burst", raw)?;
                }
            }
        }
        opts.finish(cursor);

        let mut out = vec!["limit".to_string()];
        emit(&mut out, negated_rate, "limit", Some(&format_rate(period)));
        if burst != DEFAULT_BURST {
            emit(&mut out, false, "limit-burst", Some(&burst.to_string()));
        }
        Ok(out)
    }
}

#[derive(Default)]
struct HashlimitConfig {
    rate: Option<(&'static str, u64)>,
    burst: Option<u32>,
    mode: Option<String>,
    srcmask: Option<u8>,
    dstmask: Option<u8>,
    name: Option<String>,
    size: Option<u32>,
    max: Option<u32>,
    gcinterval: Option<u32>,
    expire: Option<u32>,
}

impl Extension for Hashlimit {
    fn name(&self) -> &'static str {
        "hashlimit"
    }

    fn parse(&self, family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut cfg = HashlimitConfig::default();

        while let Some((negated, name)) = opts.next(HASHLIMIT_OPTIONS) {
            not_negatable(negated, name)?;
            let option = format!("--{name}");
            let raw = opts.value(name)?;
            match name {
                "hashlimit" | "hashlimit-upto" | "hashlimit-above" => {
                    opts.once("hashlimit-upto")?;
                    let which = if name == "hashlimit-above" {
                        "hashlimit-above"
                    } else {
                        "hashlimit-upto"
                    };
                    cfg.rate = Some((which, parse_rate(&option, raw)?));
                }
                "hashlimit-burst" => {
                    opts.once(name)?;
                    cfg.burst = Some(parse_burst(&option, raw)?);
                }
                "hashlimit-mode" => {
                    opts.once(name)?;
                    cfg.mode = Some(sort_mode(raw)?);
                }
                "hashlimit-srcmask" | "hashlimit-dstmask" => {
                    opts.once(name)?;
                    let mask: u8 = parse_number(&option, raw)?;
                    if mask > family.max_prefix() {
                        return Err(ParseError::invalid(&option, raw, "mask longer than the address"));
                    }
                    if name == "hashlimit-srcmask" {
                        cfg.srcmask = Some(mask);
                    } else {
                        cfg.dstmask = Some(mask);
                    }
                }
                "hashlimit-name" => {
                    opts.once(name)?;
                    if raw.is_empty() || raw.len() > 15 {
                        return Err(ParseError::invalid(&option, raw, "name must be 1 to 15 characters"));
                    }
                    cfg.name = Some(raw.to_string());
                }
                _ => {
                    opts.once(name)?;
                    let value: u32 = parse_number(&option, raw)?;
                    match name {
                        "hashlimit-htable-size" => cfg.size = Some(value),
                        "hashlimit-htable-max" => cfg.max = Some(value),
                        "hashlimit-htable-gcinterval" => cfg.gcinterval = Some(value),
                        _ => cfg.expire = Some(value),
                    }
                }
            }
        }
        opts.finish(cursor);

        let (which, period) = cfg.rate.ok_or_else(|| {
            ParseError::invalid("-m hashlimit", "", "--hashlimit-upto or --hashlimit-above is required")
        })?;
        let name = cfg
            .name
            .ok_or_else(|| ParseError::MissingArgument("--hashlimit-name".to_string()))?;

        let mut out = vec!["hashlimit".to_string()];
        emit(&mut out, false, which, Some(&format_rate(period)));
        let burst = cfg.burst.unwrap_or(DEFAULT_BURST);
        emit(&mut out, false, "hashlimit-burst", Some(&burst.to_string()));
        if let Some(mode) = cfg.mode {
            emit(&mut out, false, "hashlimit-mode", Some(&mode));
        }
        for (option, mask) in [("hashlimit-srcmask", cfg.srcmask), ("hashlimit-dstmask", cfg.dstmask)] {
            if let Some(mask) = mask {
                emit(&mut out, false, option, Some(&mask.to_string()));
            }
        }
        emit(&mut out, false, "hashlimit-name", Some(&name));
        for (option, value) in [
            ("hashlimit-htable-size", cfg.size),
            ("hashlimit-htable-max", cfg.max),
            ("hashlimit-htable-gcinterval", cfg.gcinterval),
        ] {
            if let Some(value) = value {
                emit(&mut out, false, option, Some(&value.to_string()));
            }
        }
        let expire = cfg.expire.unwrap_or(DEFAULT_EXPIRE);
        emit(&mut out, false, "hashlimit-htable-expire", Some(&expire.to_string()));
        Ok(out)
    }
}

/// Parse `N[/unit]` into a period; a bare number is per second and units
/// may be abbreviated (`s`, `min`, `h`, `d`).
fn parse_rate(option: &str, raw: &str) -> Result<u64, ParseError> {
    let (number, unit) = match raw.split_once('/') {
        Some((number, unit)) => (number, Some(unit.to_ascii_lowercase())),
        None => (raw, None),
    };

    let mult = match unit {
        None => SCALE,
        Some(unit) => UNITS
            .iter()
            .find(|(name, _)| !unit.is_empty() && name.starts_with(unit.as_str()))
            .map(|(_, mult)| *mult)
            .ok_or_else(|| ParseError::invalid(option, raw, "unknown rate unit"))?,
    };

    let count: u64 = parse_number(option, number)?;
    if count == 0 {
        return Err(ParseError::invalid(option, raw, "rate must be positive"));
    }
    if count > mult {
        return Err(ParseError::invalid(option, raw, "rate too fast"));
    }
    Ok(mult / count)
}

/// Print a period with the largest unit that represents it without losing
/// more than the kernel's rounding already did.
fn format_rate(period: u64) -> String {
    let mut index = 1;
    while index < PRINTED_UNITS.len() {
        let mult = PRINTED_UNITS[index].1;
        if period > mult || mult / period < mult % period {
            break;
        }
        index += 1;
    }
    let (unit, mult) = PRINTED_UNITS[index - 1];
    format!("{}/{unit}", mult / period)
}

fn parse_burst(option: &str, raw: &str) -> Result<u32, ParseError> {
    let burst: u32 = parse_number(option, raw)?;
    if burst == 0 || burst > 10_000 {
        return Err(ParseError::invalid(option, raw, "burst must be between 1 and 10000"));
    }
    Ok(burst)
}

fn sort_mode(raw: &str) -> Result<String, ParseError> {
    let mut indices = Vec::new();
    for mode in raw.split(',') {
        let index = MODE_ORDER
            .iter()
            .position(|known| *known == mode)
            .ok_or_else(|| ParseError::invalid("--hashlimit-mode", raw, format!("unknown mode '{mode}'")))?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices.iter().map(|&i| MODE_ORDER[i]).collect::<Vec<_>>().join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::test_support::run;

    #[test]
    fn rates_print_like_the_kernel_stores_them() {
        assert_eq!(format_rate(parse_rate("--limit", "3/hour").unwrap()), "3/hour");
        assert_eq!(format_rate(parse_rate("--limit", "10/s").unwrap()), "10/sec");
        assert_eq!(format_rate(parse_rate("--limit", "60/min").unwrap()), "1/sec");
        assert_eq!(format_rate(parse_rate("--limit", "25").unwrap()), "25/sec");
        assert_eq!(format_rate(parse_rate("--limit", "2/d").unwrap()), "2/day");
        assert!(parse_rate("--limit", "5/fortnight").is_err());
        assert!(parse_rate("--limit", "5/seconds").is_err());
        assert!(parse_rate("--limit", "0/sec").is_err());
        assert!(parse_rate("--limit", "20000/sec").is_err());
    }

    #[test]
    fn limit_defaults() {
        let (args, _) = run(&Limit, Family::Ipv4, "-j LOG").unwrap();
        assert_eq!(args, "limit --limit 3/hour");
        let (args, _) = run(&Limit, Family::Ipv4, "--limit-burst 5 --limit 5/minute").unwrap();
        assert_eq!(args, "limit --limit 5/min");
        let (args, _) = run(&Limit, Family::Ipv4, "--limit 1/s --limit-burst 20").unwrap();
        assert_eq!(args, "limit --limit 1/sec --limit-burst 20");
    }

    #[test]
    fn hashlimit_fills_defaults_and_sorts_mode() {
        let (args, _) = run(
            &Hashlimit,
            Family::Ipv4,
            "--hashlimit-name ssh --hashlimit-mode dstport,srcip --hashlimit-upto 4",
        )
        .unwrap();
        assert_eq!(
            args,
            "hashlimit --hashlimit-upto 4/sec --hashlimit-burst 5 --hashlimit-mode srcip,dstport \
             --hashlimit-name ssh --hashlimit-htable-expire 10000"
        );
    }

    #[test]
    fn hashlimit_above_and_masks() {
        let (args, _) = run(
            &Hashlimit,
            Family::Ipv6,
            "--hashlimit-above 1/min --hashlimit-srcmask 64 --hashlimit-name x --hashlimit-htable-expire 60000",
        )
        .unwrap();
        assert_eq!(
            args,
            "hashlimit --hashlimit-above 1/min --hashlimit-burst 5 --hashlimit-srcmask 64 \
             --hashlimit-name x --hashlimit-htable-expire 60000"
        );
        assert!(run(&Hashlimit, Family::Ipv4, "--hashlimit-upto 1 --hashlimit-srcmask 64 --hashlimit-name x").is_err());
    }

    #[test]
    fn hashlimit_requires_rate_and_name() {
        assert!(run(&Hashlimit, Family::Ipv4, "--hashlimit-name x").is_err());
        assert!(matches!(
            run(&Hashlimit, Family::Ipv4, "--hashlimit-upto 1"),
            Err(ParseError::MissingArgument(_))
        ));
        assert!(matches!(
            run(&Hashlimit, Family::Ipv4, "--hashlimit-upto 1 --hashlimit-above 2"),
            Err(ParseError::DuplicateParameter(_))
        ));
    }
}
