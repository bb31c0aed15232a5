use crate::error::ParseError;

pub const K_MARKER: &str = "k=";

const K_TOKEN: usize = 1;
const RUNTIME_TOKEN: usize = 3;

/// One `k= <k> <unit> <runtime> ...` line of a run log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedLine {
    pub k: u64,
    pub runtime: f64,
}

/// Parses a run log line.
///
/// Returns `None` for lines that do not start with [`K_MARKER`], which carry
/// no samples and are skipped by every caller.
pub fn parse_k_line(line: &str) -> Option<Result<ParsedLine, ParseError>> {
    if !line.starts_with(K_MARKER) {
        return None;
    }
    Some(parse_tokens(line))
}

fn parse_tokens(line: &str) -> Result<ParsedLine, ParseError> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() <= RUNTIME_TOKEN {
        return Err(ParseError::MissingTokens {
            expected: RUNTIME_TOKEN + 1,
            found: tokens.len(),
        });
    }
    let k = tokens[K_TOKEN]
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidInteger(tokens[K_TOKEN].to_owned()))?;
    let runtime = float_token(&tokens, RUNTIME_TOKEN)?;
    Ok(ParsedLine { k, runtime })
}

/// Reads the whitespace-separated token at `idx` as a finite float.
pub fn float_token(tokens: &[&str], idx: usize) -> Result<f64, ParseError> {
    let token = tokens.get(idx).ok_or(ParseError::MissingTokens {
        expected: idx + 1,
        found: tokens.len(),
    })?;
    let value = token
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidFloat((*token).to_owned()))?;
    if !value.is_finite() {
        return Err(ParseError::NonFinite((*token).to_owned()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_k_and_runtime() {
        let parsed = parse_k_line("k= 10 time= 0.125 sec").unwrap().unwrap();
        assert_eq!(parsed, ParsedLine { k: 10, runtime: 0.125 });
    }

    #[test]
    fn ignores_other_lines() {
        assert!(parse_k_line("Number_of_Results = 12").is_none());
        assert!(parse_k_line(" k= 1 x 1.0").is_none());
        assert!(parse_k_line("").is_none());
    }

    #[test]
    fn rejects_short_lines() {
        assert_eq!(
            parse_k_line("k= 1 x").unwrap(),
            Err(ParseError::MissingTokens {
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        assert_eq!(
            parse_k_line("k= abc x y").unwrap(),
            Err(ParseError::InvalidInteger("abc".to_owned()))
        );
        assert_eq!(
            parse_k_line("k= 3 x y").unwrap(),
            Err(ParseError::InvalidFloat("y".to_owned()))
        );
    }

    #[test]
    fn rejects_non_finite_runtimes() {
        assert_eq!(
            parse_k_line("k= 1 x nan").unwrap(),
            Err(ParseError::NonFinite("nan".to_owned()))
        );
        assert_eq!(
            parse_k_line("k= 1 x inf").unwrap(),
            Err(ParseError::NonFinite("inf".to_owned()))
        );
    }

    #[test]
    fn marker_glued_to_value_shifts_tokens() {
        // "k=1" is a single token, so the runtime slot is one place short
        assert!(parse_k_line("k=1 x 1.0").unwrap().is_err());
    }
}
