//! Operator line tokenizer.
//!
//! Tokens are separated by unescaped spaces. `\` escapes the next character,
//! and a `'` or `"` region splices its (recursively unescaped) contents into
//! the surrounding token, so `a"b"c` yields `abc`. Unterminated quotes and
//! trailing escapes absorb the rest of the input instead of failing.

const TOKEN_SEPARATOR: char = ' ';
const ESCAPE: char = '\\';

fn is_quote(candidate: char) -> bool {
    candidate == '"' || candidate == '\''
}

struct ScannedToken {
    text: String,
    end: usize,
    quoted: bool,
}

/// Scans one token starting at `start`, returning the index of the
/// terminating separator (or the input length).
fn scan_token(chars: &[char], start: usize) -> ScannedToken {
    // Open quote regions, innermost last. Each region ends at its own quote char.
    let mut open_quotes: Vec<char> = Vec::new();
    let mut text = String::new();
    let mut escaped = false;
    let mut quoted = false;
    let mut index = start;

    while index < chars.len() {
        let current = chars[index];
        let stop = open_quotes.last().copied().unwrap_or(TOKEN_SEPARATOR);
        if !escaped && current == stop {
            if open_quotes.pop().is_none() {
                return ScannedToken {
                    text,
                    end: index,
                    quoted,
                };
            }
        } else if escaped {
            text.push(current);
            escaped = false;
        } else if is_quote(current) {
            open_quotes.push(current);
            quoted = true;
        } else if current == ESCAPE {
            escaped = true;
        } else {
            text.push(current);
        }
        index += 1;
    }

    ScannedToken {
        text,
        end: chars.len(),
        quoted,
    }
}

/// Splits an operator line into tokens.
///
/// Runs of separators never produce empty tokens; an explicit empty quote
/// pair (`""`) still yields an empty token.
pub fn tokenize(line: &str) -> Vec<String> {
    let chars = line.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let scanned = scan_token(&chars, index);
        if !scanned.text.is_empty() || scanned.quoted {
            tokens.push(scanned.text);
        }
        index = scanned.end + 1;
    }
    tokens
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::tokenize;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn unit_tokenize_splits_quotes_and_escaped_spaces() {
        assert_eq!(
            tokenize(r#"cmd "a b" c\ d"#),
            tokens(&["cmd", "a b", "c d"])
        );
    }

    #[test]
    fn unit_tokenize_splices_quoted_regions_into_surrounding_token() {
        assert_eq!(tokenize(r#"a"b"c"#), tokens(&["abc"]));
        assert_eq!(tokenize("say 'hello world'!"), tokens(&["say", "hello world!"]));
    }

    #[test]
    fn unit_tokenize_skips_runs_of_spaces() {
        assert_eq!(tokenize("  stop    -highlight  "), tokens(&["stop", "-highlight"]));
        assert!(tokenize("").is_empty());
        assert!(tokenize("     ").is_empty());
    }

    #[test]
    fn unit_tokenize_escape_keeps_quote_literal() {
        assert_eq!(tokenize(r#"say \"hi\""#), tokens(&["say", "\"hi\""]));
        assert_eq!(tokenize(r#""in \" side""#), tokens(&["in \" side"]));
    }

    #[test]
    fn unit_tokenize_keeps_explicit_empty_quotes() {
        assert_eq!(tokenize(r#"view """#), tokens(&["view", ""]));
    }

    #[test]
    fn regression_unterminated_quote_absorbs_remaining_input() {
        assert_eq!(tokenize(r#"say "open ended  text"#), tokens(&["say", "open ended  text"]));
    }

    #[test]
    fn regression_trailing_escape_is_dropped() {
        assert_eq!(tokenize(r"key abc\"), tokens(&["key", "abc"]));
    }

    #[test]
    fn regression_nested_other_quote_is_spliced_recursively() {
        assert_eq!(tokenize(r#""x'y z'w" tail"#), tokens(&["xy zw", "tail"]));
    }

    #[test]
    fn unit_tokenize_handles_multibyte_characters() {
        assert_eq!(tokenize("grüße 'ç a'"), tokens(&["grüße", "ç a"]));
    }

    proptest! {
        #[test]
        fn functional_plain_words_round_trip(words in prop::collection::vec("[a-z0-9.-]{1,8}", 0..8)) {
            let line = words.join("  ");
            prop_assert_eq!(tokenize(&line), words);
        }

        #[test]
        fn functional_tokenize_never_panics_and_tokens_hold_no_separator_without_quoting(line in "[a-z \\\\'\"]{0,40}") {
            let produced = tokenize(&line);
            if !line.contains('\\') && !line.contains('\'') && !line.contains('"') {
                prop_assert!(produced.iter().all(|token| !token.contains(' ') && !token.is_empty()));
            }
        }
    }
}
