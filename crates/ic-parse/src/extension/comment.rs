use super::{Extension, Options, not_negatable, quote};
use crate::error::ParseError;
use ic_core::Family;

const MAX_COMMENT: usize = 256;

pub(crate) struct Comment;

impl Extension for Comment {
    fn name(&self) -> &'static str {
        "comment"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut text = None;
        while let Some((negated, name)) = opts.next(&["comment"]) {
            not_negatable(negated, name)?;
            opts.once(name)?;
            let raw = opts.value(name)?;
            if raw.chars().count() > MAX_COMMENT {
                return Err(ParseError::invalid(
                    "--comment",
                    raw,
                    format!("longer than {MAX_COMMENT} characters"),
                ));
            }
            text = Some(raw);
        }
        opts.finish(cursor);

        let text = text.ok_or_else(|| ParseError::MissingArgument("--comment".to_string()))?;
        Ok(vec!["comment".to_string(), "--comment".to_string(), quote(text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::test_support::run;

    #[test]
    fn comments_are_always_quoted() {
        let (args, _) = run(&Comment, Family::Ipv4, "--comment ssh").unwrap();
        assert_eq!(args, "comment --comment \"ssh\"");
        let (args, _) = run(&Comment, Family::Ipv4, r#"--comment 'say "hi"'"#).unwrap();
        assert_eq!(args, r#"comment --comment "say \"hi\"""#);
    }

    #[test]
    fn long_or_missing_comments_fail() {
        let long = "x".repeat(257);
        assert!(run(&Comment, Family::Ipv4, &format!("--comment {long}")).is_err());
        assert!(run(&Comment, Family::Ipv4, "").is_err());
    }
}
