//! Date pattern translation
//!
//! Rule authors write `DATE_FMT` patterns with the letter vocabulary used by
//! most ERP tooling (`yyyy-MM-dd`, `dd/MM/yyyy`, `EEE d MMM yyyy`). This module
//! compiles them to chrono format items.

use chrono::format::{Item, StrftimeItems};

/// A compiled date pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    strftime: String,
}

impl DatePattern {
    /// Compile a pattern
    ///
    /// Letters are grouped into runs (`yyyy`, `MM`, ...). Text in single quotes
    /// is literal and `''` is an escaped quote. Any other ASCII letter is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported letters or an unterminated quote.
    pub fn compile(pattern: &str) -> crate::Result<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut out = String::with_capacity(pattern.len() * 2);
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            if ch == '\'' {
                i = push_quoted(&chars, i, &mut out, pattern)?;
                continue;
            }
            if !ch.is_ascii_alphabetic() {
                push_literal(ch, &mut out);
                i += 1;
                continue;
            }

            let run = chars[i..].iter().take_while(|c| **c == ch).count();
            out.push_str(letter_run(ch, run).ok_or_else(|| {
                crate::Error::transform(
                    "DATE_FMT",
                    format!("Unsupported pattern letter '{ch}' in '{pattern}'"),
                )
            })?);
            i += run;
        }

        Ok(Self {
            source: pattern.to_string(),
            strftime: out,
        })
    }

    /// The pattern as written in the rule
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The equivalent strftime string
    #[must_use]
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    /// Parsed chrono items for formatting
    ///
    /// # Errors
    ///
    /// Returns an error if chrono rejects the translated pattern.
    pub fn items(&self) -> crate::Result<Vec<Item<'_>>> {
        let items: Vec<Item<'_>> = StrftimeItems::new(&self.strftime).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(crate::Error::transform(
                "DATE_FMT",
                format!("Invalid date pattern '{}'", self.source),
            ));
        }
        Ok(items)
    }
}

fn push_literal(ch: char, out: &mut String) {
    match ch {
        '%' => out.push_str("%%"),
        '\t' => out.push_str("%t"),
        '\n' => out.push_str("%n"),
        other => out.push(other),
    }
}

/// Copy a quoted section starting at `start`, returning the index after it.
fn push_quoted(
    chars: &[char],
    start: usize,
    out: &mut String,
    pattern: &str,
) -> crate::Result<usize> {
    // '' outside a quoted section is a literal quote
    if chars.get(start + 1) == Some(&'\'') {
        out.push('\'');
        return Ok(start + 2);
    }

    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        push_literal(chars[i], out);
        i += 1;
    }

    Err(crate::Error::transform(
        "DATE_FMT",
        format!("Unterminated quote in '{pattern}'"),
    ))
}

fn letter_run(letter: char, run: usize) -> Option<&'static str> {
    let spec = match (letter, run) {
        ('y' | 'u', 2) => "%y",
        ('y' | 'u', _) => "%Y",
        ('M' | 'L', 1) => "%-m",
        ('M' | 'L', 2) => "%m",
        ('M' | 'L', 3) => "%b",
        ('M' | 'L', 4) => "%B",
        ('d', 1) => "%-d",
        ('d', 2) => "%d",
        ('D', 1) => "%-j",
        ('D', 3) => "%j",
        ('E', 1..=3) => "%a",
        ('E', 4) => "%A",
        ('e', 1) => "%u",
        ('H', 1) => "%-H",
        ('H', 2) => "%H",
        ('h', 1) => "%-I",
        ('h', 2) => "%I",
        ('m', 1) => "%-M",
        ('m', 2) => "%M",
        ('s', 1) => "%-S",
        ('s', 2) => "%S",
        ('S', 3) => "%3f",
        ('S', 6) => "%6f",
        ('S', 9) => "%9f",
        ('a', 1) => "%p",
        _ => return None,
    };
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_iso_pattern() {
        let pattern = DatePattern::compile("yyyy-MM-dd").unwrap();
        assert_eq!(pattern.strftime(), "%Y-%m-%d");
    }

    #[test]
    fn test_compile_day_first_pattern() {
        let pattern = DatePattern::compile("dd/MM/yyyy").unwrap();
        assert_eq!(pattern.strftime(), "%d/%m/%Y");
    }

    #[test]
    fn test_compile_text_fields() {
        let pattern = DatePattern::compile("EEE, d MMM yy").unwrap();
        assert_eq!(pattern.strftime(), "%a, %-d %b %y");
    }

    #[test]
    fn test_compile_quoted_literal() {
        let pattern = DatePattern::compile("yyyyMMdd'T'HHmm").unwrap();
        assert_eq!(pattern.strftime(), "%Y%m%dT%H%M");

        let pattern = DatePattern::compile("dd 'o''clock' ''").unwrap();
        assert_eq!(pattern.strftime(), "%d o'clock '");
    }

    #[test]
    fn test_percent_is_escaped() {
        let pattern = DatePattern::compile("yyyy%").unwrap();
        assert_eq!(pattern.strftime(), "%Y%%");
        assert!(pattern.items().is_ok());
    }

    #[test]
    fn test_rejects_unknown_letter() {
        assert!(DatePattern::compile("yyyy-QQ").is_err());
        assert!(DatePattern::compile("ddd").is_err());
    }

    #[test]
    fn test_day_of_year_widths() {
        assert_eq!(DatePattern::compile("D").unwrap().strftime(), "%-j");
        assert_eq!(DatePattern::compile("DDD").unwrap().strftime(), "%j");
        // two-digit padding has no chrono equivalent
        assert!(DatePattern::compile("DD").is_err());
    }

    #[test]
    fn test_rejects_narrow_text_forms() {
        assert_eq!(DatePattern::compile("MMMM").unwrap().strftime(), "%B");
        assert_eq!(DatePattern::compile("EEEE").unwrap().strftime(), "%A");
        assert!(DatePattern::compile("MMMMM").is_err());
        assert!(DatePattern::compile("EEEEE").is_err());
    }

    #[test]
    fn test_rejects_unterminated_quote() {
        assert!(DatePattern::compile("yyyy 'at").is_err());
    }
}
