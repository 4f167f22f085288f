use super::{Extension, Options, emit, not_negatable, parse_number};
use crate::error::ParseError;
use ic_core::Family;

pub(crate) struct Ct;

/// The legacy NOTRACK target, printed the way the CT target stores it.
pub(crate) struct NoTrack;

impl Extension for Ct {
    fn name(&self) -> &'static str {
        "CT"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut notrack = false;
        let mut helper = None;
        let mut zone: Option<u16> = None;

        while let Some((negated, name)) = opts.next(&["notrack", "helper", "zone"]) {
            not_negatable(negated, name)?;
            opts.once(name)?;
            match name {
                "notrack" => notrack = true,
                "helper" => helper = Some(opts.value(name)?),
                _ => zone = Some(parse_number("--zone", opts.value(name)?)?),
            }
        }
        opts.finish(cursor);

        if notrack && (helper.is_some() || zone.is_some()) {
            return Err(ParseError::invalid("--notrack", "", "cannot be combined with other CT options"));
        }
        let mut out = vec!["CT".to_string()];
        if notrack {
            emit(&mut out, false, "notrack", None);
        }
        if let Some(helper) = helper {
            emit(&mut out, false, "helper", Some(helper));
        }
        if let Some(zone) = zone {
            emit(&mut out, false, "zone", Some(&zone.to_string()));
        }
        Ok(out)
    }
}

impl Extension for NoTrack {
    fn name(&self) -> &'static str {
        "NOTRACK"
    }

    fn parse(&self, _family: Family, _tokens: &[String], _cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        Ok(vec!["CT".to_string(), "--notrack".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::test_support::run;

    #[test]
    fn notrack_is_rewritten() {
        let (args, cursor) = run(&NoTrack, Family::Ipv4, "--zone 1").unwrap();
        assert_eq!(args, "CT --notrack");
        assert_eq!(cursor, 0);
    }

    #[test]
    fn ct_options_render_in_order() {
        let (args, _) = run(&Ct, Family::Ipv4, "--zone 3 --helper ftp").unwrap();
        assert_eq!(args, "CT --helper ftp --zone 3");
        assert!(run(&Ct, Family::Ipv4, "--notrack --zone 3").is_err());
    }
}
