use std::fmt;

use regex::Regex;
use serde::Deserialize;

use crate::record::FieldValue;

// ---------------------------------------------------------------------------
// Config form
// ---------------------------------------------------------------------------

/// Validation rule as written in the catalog, e.g.
/// `rule = { kind = "length", min = 7, max = 7 }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum RuleDocument {
    Pattern {
        regex: String,
    },
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    Float {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Rule {
    /// Full-match regex. `source` keeps the pattern as written for diagnostics.
    Pattern { regex: Regex, source: String },
    /// Bounds on the number of characters (not bytes).
    Length { min: Option<usize>, max: Option<usize> },
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
}

impl Rule {
    pub fn compile(doc: &RuleDocument) -> Result<Self, String> {
        match doc {
            RuleDocument::Pattern { regex } => {
                if regex.is_empty() {
                    return Err("pattern rule has an empty regex".into());
                }
                let anchored = format!("^(?:{regex})$");
                let compiled = Regex::new(&anchored)
                    .map_err(|e| format!("bad regex '{regex}': {e}"))?;
                Ok(Self::Pattern {
                    regex: compiled,
                    source: regex.clone(),
                })
            }
            RuleDocument::Length { min, max } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("length rule has min {lo} > max {hi}"));
                    }
                }
                Ok(Self::Length {
                    min: *min,
                    max: *max,
                })
            }
            RuleDocument::Integer { min, max } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("integer rule has min {lo} > max {hi}"));
                    }
                }
                Ok(Self::Integer {
                    min: *min,
                    max: *max,
                })
            }
            RuleDocument::Float { min, max } => {
                for bound in [min, max].into_iter().flatten() {
                    if !bound.is_finite() {
                        return Err("float rule bounds must be finite".into());
                    }
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("float rule has min {lo} > max {hi}"));
                    }
                }
                Ok(Self::Float {
                    min: *min,
                    max: *max,
                })
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Float { .. })
    }

    /// Check `text` against the rule. Returns the typed value on success.
    pub fn check(&self, text: &str) -> Option<FieldValue> {
        match self {
            Self::Pattern { regex, .. } => {
                regex.is_match(text).then(|| FieldValue::Text(text.to_string()))
            }
            Self::Length { min, max } => {
                let len = text.chars().count();
                let ok = min.map_or(true, |m| len >= m) && max.map_or(true, |m| len <= m);
                ok.then(|| FieldValue::Text(text.to_string()))
            }
            Self::Integer { min, max } => {
                let n = parse_integer(text)?;
                let ok = min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m);
                ok.then_some(FieldValue::Integer(n))
            }
            Self::Float { min, max } => {
                let n = parse_decimal(text)?;
                let ok = min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m);
                ok.then_some(FieldValue::Float(n))
            }
        }
    }
}

/// An integer, also when written as a whole decimal ("24.0").
fn parse_integer(text: &str) -> Option<i64> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let f: f64 = text.parse().ok()?;
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    let whole = f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64;
    whole.then_some(f as i64)
}

/// Parse a decimal that may use a comma as the separator ("12,5").
fn parse_decimal(text: &str) -> Option<f64> {
    let n: f64 = if !text.contains('.') && text.matches(',').count() == 1 {
        text.replace(',', ".").parse().ok()?
    } else {
        text.parse().ok()?
    };
    n.is_finite().then_some(n)
}

fn bounds<T: fmt::Display>(min: &Option<T>, max: &Option<T>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{lo}..={hi}"),
        (Some(lo), None) => format!(">={lo}"),
        (None, Some(hi)) => format!("<={hi}"),
        (None, None) => "any".into(),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern { source, .. } => write!(f, "pattern /{source}/"),
            Self::Length { min, max } => write!(f, "length {}", bounds(min, max)),
            Self::Integer { min, max } => write!(f, "integer {}", bounds(min, max)),
            Self::Float { min, max } => write!(f, "float {}", bounds(min, max)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(toml_rule: &str) -> Result<Rule, String> {
        #[derive(Deserialize)]
        struct Holder {
            rule: RuleDocument,
        }
        let holder: Holder = toml::from_str(&format!("rule = {toml_rule}")).unwrap();
        Rule::compile(&holder.rule)
    }

    #[test]
    fn pattern_is_full_match() {
        let rule = compile(r#"{ kind = "pattern", regex = "[A-Z]{2}[0-9]{5}" }"#).unwrap();
        assert!(rule.check("VS12345").is_some());
        assert!(rule.check("XVS12345").is_none());
        assert!(rule.check("VS123456").is_none());
    }

    #[test]
    fn pattern_with_alternation_is_anchored_as_a_whole() {
        let rule = compile(r#"{ kind = "pattern", regex = "DA|NU" }"#).unwrap();
        assert!(rule.check("DA").is_some());
        assert!(rule.check("NU").is_some());
        assert!(rule.check("DAX").is_none());
        assert!(rule.check("XNU").is_none());
    }

    #[test]
    fn bad_regex_is_reported() {
        let err = compile(r#"{ kind = "pattern", regex = "([A-Z" }"#).unwrap_err();
        assert!(err.contains("bad regex"));
    }

    #[test]
    fn length_counts_characters() {
        let rule = compile(r#"{ kind = "length", min = 7, max = 7 }"#).unwrap();
        assert_eq!(rule.check("BÂRLAD1"), Some(FieldValue::Text("BÂRLAD1".into())));
        assert!(rule.check("BARLAD").is_none());
    }

    #[test]
    fn length_rejects_inverted_bounds() {
        assert!(compile(r#"{ kind = "length", min = 9, max = 3 }"#).is_err());
    }

    #[test]
    fn integer_range() {
        let rule = compile(r#"{ kind = "integer", min = 1, max = 64 }"#).unwrap();
        assert_eq!(rule.check("8"), Some(FieldValue::Integer(8)));
        assert!(rule.check("0").is_none());
        assert!(rule.check("65").is_none());
        assert!(rule.check("8.5").is_none());
        assert!(rule.check("opt").is_none());
    }

    #[test]
    fn integer_written_as_whole_decimal() {
        let rule = compile(r#"{ kind = "integer", min = 1, max = 864 }"#).unwrap();
        assert_eq!(rule.check("24.0"), Some(FieldValue::Integer(24)));
        assert_eq!(rule.check("2.4e1"), Some(FieldValue::Integer(24)));
        assert!(rule.check("24.5").is_none());
        assert!(rule.check("865.0").is_none());
        assert!(rule.check("NaN").is_none());
        assert!(rule.check("1e300").is_none());
    }

    #[test]
    fn float_accepts_comma_separator() {
        let rule = compile(r#"{ kind = "float", min = 0.0 }"#).unwrap();
        assert_eq!(rule.check("12,5"), Some(FieldValue::Float(12.5)));
        assert_eq!(rule.check("3.25"), Some(FieldValue::Float(3.25)));
        assert!(rule.check("-1").is_none());
        assert!(rule.check("1,000,5").is_none());
        assert!(rule.check("NaN").is_none());
    }

    #[test]
    fn display_names_the_rule() {
        let rule = compile(r#"{ kind = "integer", min = 1 }"#).unwrap();
        assert_eq!(rule.to_string(), "integer >=1");
        let rule = compile(r#"{ kind = "length", min = 7, max = 7 }"#).unwrap();
        assert_eq!(rule.to_string(), "length 7..=7");
    }
}
