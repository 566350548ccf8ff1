//! Parser for abstract reaction notation
//!
//! Reactions are written one per line in the usual chemical shorthand:
//! `R -> 2 R`, `R + F -> 2 F`, `A <=> B`. A `<=>` line declares a
//! reversible reaction, which counts as two reaction channels (forward
//! and backward) with two rate parameters.

use crate::error::{CoreError, Result};

/// One side of a reaction: species symbols with stoichiometric counts
pub type SideTerms = Vec<(String, u32)>;

/// A parsed reaction line, prior to symbol interning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReaction {
    /// Left-hand side terms
    pub sources: SideTerms,
    /// Right-hand side terms
    pub targets: SideTerms,
    /// True when the line used the `<=>` arrow
    pub reversible: bool,
    /// Normalized reaction text, used as a stable rate-lookup key
    pub text: String,
}

/// Parse a single reaction line.
pub fn parse_reaction(line: &str) -> Result<ParsedReaction> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CoreError::parse_reaction(line, "empty line"));
    }

    let (lhs, rhs, reversible) = if let Some((lhs, rhs)) = trimmed.split_once("<=>") {
        (lhs, rhs, true)
    } else if let Some((lhs, rhs)) = trimmed.split_once("->") {
        (lhs, rhs, false)
    } else {
        return Err(CoreError::parse_reaction(line, "missing '->' or '<=>' arrow"));
    };

    let sources = parse_side(lhs, line)?;
    let targets = parse_side(rhs, line)?;
    if sources.is_empty() {
        return Err(CoreError::parse_reaction(line, "missing left-hand side"));
    }
    if targets.is_empty() {
        return Err(CoreError::parse_reaction(line, "missing right-hand side"));
    }

    let arrow = if reversible { "<=>" } else { "->" };
    let text = format!("{} {} {}", format_side(&sources), arrow, format_side(&targets));

    Ok(ParsedReaction {
        sources,
        targets,
        reversible,
        text,
    })
}

fn parse_side(side: &str, line: &str) -> Result<SideTerms> {
    let mut terms: SideTerms = Vec::new();
    for raw_term in side.split('+') {
        let term = raw_term.trim();
        if term.is_empty() {
            return Err(CoreError::parse_reaction(line, "empty term between '+'"));
        }
        let (count, symbol) = split_count(term, line)?;
        // Repeated mentions of a symbol on one side accumulate stoichiometry
        if let Some(entry) = terms.iter_mut().find(|(sym, _)| sym == symbol) {
            entry.1 += count;
        } else {
            terms.push((symbol.to_string(), count));
        }
    }
    Ok(terms)
}

/// Split an optional leading stoichiometric count off a term: `2 R` or `2R`.
fn split_count<'a>(term: &'a str, line: &str) -> Result<(u32, &'a str)> {
    let digits_end = term
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .map(|(i, c)| i + c.len_utf8())
        .last();

    match digits_end {
        None => validate_symbol(term, line).map(|sym| (1, sym)),
        Some(end) => {
            let count: u32 = term[..end]
                .parse()
                .map_err(|_| CoreError::parse_reaction(line, "bad stoichiometric count"))?;
            if count == 0 {
                return Err(CoreError::parse_reaction(line, "zero stoichiometric count"));
            }
            let symbol = term[end..].trim_start();
            validate_symbol(symbol, line).map(|sym| (count, sym))
        }
    }
}

fn validate_symbol<'a>(symbol: &'a str, line: &str) -> Result<&'a str> {
    if symbol.is_empty() {
        return Err(CoreError::parse_reaction(line, "missing species symbol"));
    }
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    let starts_ok = symbol
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid || !starts_ok {
        return Err(CoreError::parse_reaction(
            line,
            format!("invalid species symbol {:?}", symbol),
        ));
    }
    Ok(symbol)
}

fn format_side(terms: &SideTerms) -> String {
    terms
        .iter()
        .map(|(symbol, count)| {
            if *count == 1 {
                symbol.clone()
            } else {
                format!("{} {}", count, symbol)
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let r = parse_reaction("R -> 2 R").unwrap();
        assert_eq!(r.sources, vec![("R".to_string(), 1)]);
        assert_eq!(r.targets, vec![("R".to_string(), 2)]);
        assert!(!r.reversible);
        assert_eq!(r.text, "R -> 2 R");
    }

    #[test]
    fn test_parse_two_reactants() {
        let r = parse_reaction("R + F -> 2 F").unwrap();
        assert_eq!(
            r.sources,
            vec![("R".to_string(), 1), ("F".to_string(), 1)]
        );
        assert_eq!(r.targets, vec![("F".to_string(), 2)]);
    }

    #[test]
    fn test_parse_reversible() {
        let r = parse_reaction("A <=> B").unwrap();
        assert!(r.reversible);
        assert_eq!(r.text, "A <=> B");
    }

    #[test]
    fn test_parse_attached_count() {
        let r = parse_reaction("2HCN -> C1S1").unwrap();
        assert_eq!(r.sources, vec![("HCN".to_string(), 2)]);
    }

    #[test]
    fn test_repeated_symbol_accumulates() {
        let r = parse_reaction("A + A -> B").unwrap();
        assert_eq!(r.sources, vec![("A".to_string(), 2)]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_reaction("").is_err());
        assert!(parse_reaction("A B").is_err());
        assert!(parse_reaction("-> B").is_err());
        assert!(parse_reaction("A ->").is_err());
        assert!(parse_reaction("A + -> B").is_err());
        assert!(parse_reaction("0 A -> B").is_err());
        assert!(parse_reaction("A -> 2").is_err());
    }

    #[test]
    fn test_text_normalization() {
        let r = parse_reaction("  R   +  F ->   F +  F ").unwrap();
        assert_eq!(r.text, "R + F -> 2 F");
    }
}
