//! The flag-command grammar.
//!
//! A command is a whitespace-separated list of `key=value` tokens. A token
//! starting with `#` ends the command. Values may be wrapped in one layer of
//! single or double quotes.

use thiserror::Error;

use crate::{
    modes::FlagMode,
    selection::{Selection, SelectionKey},
    time::TimeError,
};

/// Problems with a single command line. These never abort a batch; the line is
/// dropped and the rest carry on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("'{0}' is not a key=value pair")]
    NotKeyValue(String),

    #[error("Unknown flagging mode '{0}'")]
    UnknownMode(String),

    #[error("Parameter {key}: '{value}' is not an integer")]
    NotInteger { key: String, value: String },

    #[error("Parameter {key}: '{value}' is not a number")]
    NotNumber { key: String, value: String },

    #[error("No flag command is left after removing the record keys")]
    EmptyCommand,

    #[error(transparent)]
    Time(#[from] TimeError),
}

/// Remove one layer of matching quotes.
pub fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Split a command line into its `key=value` pairs, stopping at a comment.
pub fn tokenise(line: &str) -> Result<Vec<(&str, &str)>, ParseError> {
    let mut pairs = vec![];
    for token in line.split_whitespace() {
        if token.starts_with('#') {
            break;
        }
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ParseError::NotKeyValue(token.to_string()))?;
        pairs.push((key, strip_quotes(value)));
    }
    Ok(pairs)
}

/// Is there nothing to parse on this line (blank, or only a comment)?
pub fn is_blank_or_comment(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with('#')
}

/// A command line split into what it selects, the mode it asks for, and
/// everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCommand {
    pub selection: Selection,

    /// `None` if no `mode` key was given (or it was empty).
    pub mode: Option<FlagMode>,

    /// Every other key, in the order given. These are candidates for
    /// mode-specific parameters; which are actually used depends on the mode.
    pub others: Vec<(String, String)>,
}

pub fn parse_command(line: &str) -> Result<ParsedCommand, ParseError> {
    classify(tokenise(line)?)
}

/// Sort already-tokenised pairs into a [`ParsedCommand`].
pub fn classify<'a, I>(pairs: I) -> Result<ParsedCommand, ParseError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut parsed = ParsedCommand::default();
    for (key, value) in pairs {
        if let Some(sel_key) = SelectionKey::from_name(key) {
            parsed.selection.set(sel_key, value);
        } else if key == "mode" {
            parsed.mode = if value.is_empty() {
                None
            } else {
                Some(
                    value
                        .parse()
                        .map_err(|_| ParseError::UnknownMode(value.to_string()))?,
                )
            };
        } else {
            parsed.others.push((key.to_string(), value.to_string()));
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_one_layer_of_quotes() {
        assert_eq!(strip_quotes("'1'"), "1");
        assert_eq!(strip_quotes("\"1\""), "1");
        assert_eq!(strip_quotes("''1''"), "'1'");
        assert_eq!(strip_quotes("'1\""), "'1\"");
        assert_eq!(strip_quotes("'"), "'");
        assert_eq!(strip_quotes(""), "");
    }

    #[test]
    fn test_tokenise() {
        let pairs = tokenise("antenna='ea01' spw=\"0:10~20\" mode=manual").unwrap();
        assert_eq!(
            pairs,
            vec![("antenna", "ea01"), ("spw", "0:10~20"), ("mode", "manual")]
        );
    }

    #[test]
    fn test_values_split_on_first_equals() {
        let err = tokenise("expression='ABS RR'").unwrap_err();
        assert_eq!(err, ParseError::NotKeyValue("RR'".to_string()));

        let pairs = tokenise("uvrange='<100m' extra=a=b").unwrap();
        assert_eq!(pairs, vec![("uvrange", "<100m"), ("extra", "a=b")]);
    }

    #[test]
    fn test_comments_end_the_line() {
        let pairs = tokenise("scan='1' #flag scan 1 antenna=2").unwrap();
        assert_eq!(pairs, vec![("scan", "1")]);
        assert!(tokenise("# scan=1").unwrap().is_empty());
        assert!(is_blank_or_comment("   # whatever"));
        assert!(is_blank_or_comment("   "));
        assert!(!is_blank_or_comment("scan=1 # whatever"));
    }

    #[test]
    fn test_missing_equals_is_an_error() {
        assert_eq!(
            tokenise("scan=1 antenna"),
            Err(ParseError::NotKeyValue("antenna".to_string()))
        );
    }

    #[test]
    fn test_parse_command() {
        let parsed =
            parse_command("antenna='1' spw='0' mode=quack quackmode='end' reason='X'").unwrap();
        assert_eq!(parsed.selection.get(SelectionKey::Antenna), Some("1"));
        assert_eq!(parsed.selection.get(SelectionKey::Spw), Some("0"));
        assert_eq!(parsed.mode, Some(FlagMode::Quack));
        assert_eq!(
            parsed.others,
            vec![
                ("quackmode".to_string(), "end".to_string()),
                ("reason".to_string(), "X".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_unknown_mode() {
        assert_eq!(
            parse_command("mode=sideways"),
            Err(ParseError::UnknownMode("sideways".to_string()))
        );
        assert_eq!(parse_command("mode='' scan=1").unwrap().mode, None);
    }
}
