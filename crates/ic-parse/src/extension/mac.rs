use super::{Extension, Options, emit};
use crate::error::ParseError;
use ic_core::Family;
use regex::Regex;
use std::sync::LazyLock;

static MAC_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$"));

pub(crate) struct Mac;

impl Extension for Mac {
    fn name(&self) -> &'static str {
        "mac"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut source = None;
        while let Some((negated, name)) = opts.next(&["mac-source"]) {
            opts.once(name)?;
            let raw = opts.value(name)?;
            let pattern = MAC_RE
                .as_ref()
                .map_err(|err| ParseError::invalid("--mac-source", raw, err.to_string()))?;
            if !pattern.is_match(raw) {
                return Err(ParseError::invalid("--mac-source", raw, "expected XX:XX:XX:XX:XX:XX"));
            }
            source = Some((negated, raw.to_ascii_uppercase()));
        }
        opts.finish(cursor);

        let (negated, source) = source.ok_or_else(|| ParseError::MissingArgument("--mac-source".to_string()))?;
        let mut out = vec!["mac".to_string()];
        emit(&mut out, negated, "mac-source", Some(&source));
        Ok(out)
    }
}
