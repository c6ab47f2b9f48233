//! Argument block parser
//!
//! Processor and module arguments are stored in a single text field, one
//! `key:value` pair per line with CRLF line breaks:
//!
//! ```text
//! threads: 4
//! mode: fast
//! ```
//!
//! Keys are trimmed as well as values, so `" threads : 4"` and `"threads:4"`
//! name the same argument.

use indexmap::IndexMap;

/// Parsed arguments in block order
pub type Arguments = IndexMap<String, String>;

/// Argument block errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument line {line} has no ':' separator: {content:?}")]
    MalformedArgument { line: usize, content: String },
}

/// Parse an argument block into an ordered mapping.
///
/// Lines split on their first `:`, so values may themselves contain colons.
/// Keys and values are trimmed. Blank lines are skipped, which makes an empty
/// block an empty mapping. A repeated key keeps its first position and its
/// last value. Both `\r\n` and bare `\n` line breaks are accepted.
pub fn parse_argument_block(block: &str) -> Result<Arguments, ArgumentError> {
    let mut arguments = Arguments::new();
    for (index, line) in block.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ArgumentError::MalformedArgument {
                line: index + 1,
                content: line.to_string(),
            })?;
        arguments.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crlf_block() {
        let args = parse_argument_block("threads: 4\r\nmode: fast").unwrap();

        assert_eq!(args.len(), 2);
        assert_eq!(args["threads"], "4");
        assert_eq!(args["mode"], "fast");
        let keys: Vec<&String> = args.keys().collect();
        assert_eq!(keys, vec!["threads", "mode"]);
    }

    #[test]
    fn test_rendered_mapping_parses_back() {
        let mut expected = Arguments::new();
        expected.insert("k1".to_string(), "v1".to_string());
        expected.insert("k2".to_string(), "v2".to_string());

        let block = expected
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join("\r\n");

        assert_eq!(parse_argument_block(&block).unwrap(), expected);
    }

    #[test]
    fn test_empty_block_is_no_arguments() {
        assert!(parse_argument_block("").unwrap().is_empty());
        assert!(parse_argument_block("\r\n  \r\n").unwrap().is_empty());
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let args = parse_argument_block("atlas: C:/atlases/mni.nii\r\nurl:http://x:8080").unwrap();
        assert_eq!(args["atlas"], "C:/atlases/mni.nii");
        assert_eq!(args["url"], "http://x:8080");
    }

    #[test]
    fn test_bare_newlines_accepted() {
        let args = parse_argument_block("a:1\nb:2\n").unwrap();
        assert_eq!(args["a"], "1");
        assert_eq!(args["b"], "2");
    }

    #[test]
    fn test_keys_and_values_trimmed() {
        let args = parse_argument_block(" threads : 4 \r\nmode:fast").unwrap();
        let pairs: Vec<(&str, &str)> = args.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("threads", "4"), ("mode", "fast")]);
    }

    #[test]
    fn test_empty_value_allowed() {
        let args = parse_argument_block("flag:").unwrap();
        assert_eq!(args["flag"], "");
    }

    #[test]
    fn test_malformed_line() {
        let err = parse_argument_block("threads: 4\r\nfast\r\nmode: x").unwrap_err();
        assert_eq!(
            err,
            ArgumentError::MalformedArgument {
                line: 2,
                content: "fast".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_key_last_value_wins() {
        let args = parse_argument_block("a:1\r\nb:2\r\na:3").unwrap();
        let pairs: Vec<(&str, &str)> = args.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }
}
