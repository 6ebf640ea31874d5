//! Field validation.
//!
//! Rules are compiled at schema load into [`Rule`] variants that carry
//! exactly the value their check needs, then evaluated per field by
//! [`validate_field`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::SchemaViolation;
use crate::schema::{Field, FieldType, FieldValue, RuleSpec, RuleType};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// A compiled rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must be present and non-empty.
    Required,
    /// Numeric lower bound, inclusive.
    Min(f64),
    /// Numeric upper bound, inclusive.
    Max(f64),
    /// Minimum character count, inclusive.
    MinLength(usize),
    /// Maximum character count, inclusive.
    MaxLength(usize),
    /// The string form must contain a match.
    Pattern(Regex),
    /// The string form must look like an email address.
    Email,
}

impl Rule {
    /// Returns the schema name of this rule kind.
    #[must_use]
    pub const fn kind(&self) -> RuleType {
        match self {
            Self::Required => RuleType::Required,
            Self::Min(_) => RuleType::Min,
            Self::Max(_) => RuleType::Max,
            Self::MinLength(_) => RuleType::MinLength,
            Self::MaxLength(_) => RuleType::MaxLength,
            Self::Pattern(_) => RuleType::Pattern,
            Self::Email => RuleType::Email,
        }
    }

    /// Returns whether `value` satisfies the rule.
    ///
    /// `Min` and `Max` accept only numbers. Length, pattern and email rules
    /// read the value's string form, which is empty for null.
    #[must_use]
    pub fn is_satisfied(&self, field_type: FieldType, value: &FieldValue) -> bool {
        match self {
            Self::Required => match value {
                FieldValue::Null => false,
                FieldValue::Text(s) => !s.is_empty(),
                FieldValue::Bool(b) => *b || field_type != FieldType::Checkbox,
                FieldValue::Number(_) => true,
            },
            Self::Min(min) => value.as_number().is_some_and(|n| n >= *min),
            Self::Max(max) => value.as_number().is_some_and(|n| n <= *max),
            Self::MinLength(min) => value.display_string().chars().count() >= *min,
            Self::MaxLength(max) => value.display_string().chars().count() <= *max,
            Self::Pattern(re) => re.is_match(&value.display_string()),
            Self::Email => EMAIL_RE.is_match(&value.display_string()),
        }
    }
}

/// A compiled rule plus the message reported when it fails.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    rule: Rule,
    message: String,
}

impl ValidationRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }

    /// Compiles a declared rule, checking that its value has the right shape.
    ///
    /// # Errors
    ///
    /// Returns the violation when the rule value is missing or has the wrong
    /// shape.
    pub fn compile(field: &str, spec: &RuleSpec) -> Result<Self, SchemaViolation> {
        let rule_name = spec.kind.as_str();
        let invalid = |message: &str| SchemaViolation::InvalidRuleValue {
            field: field.to_string(),
            rule: rule_name,
            message: message.to_string(),
        };
        let value = || {
            spec.value
                .as_ref()
                .filter(|v| !v.is_null())
                .ok_or_else(|| SchemaViolation::MissingRuleValue {
                    field: field.to_string(),
                    rule: rule_name,
                })
        };

        let rule = match spec.kind {
            RuleType::Required => Rule::Required,
            RuleType::Email => Rule::Email,
            RuleType::Min | RuleType::Max => {
                let bound = value()?
                    .as_f64()
                    .ok_or_else(|| invalid("expected a number"))?;
                if spec.kind == RuleType::Min {
                    Rule::Min(bound)
                } else {
                    Rule::Max(bound)
                }
            }
            RuleType::MinLength | RuleType::MaxLength => {
                let length = value().map(length_value)?
                    .ok_or_else(|| invalid("expected a non-negative integer"))?;
                if spec.kind == RuleType::MinLength {
                    Rule::MinLength(length)
                } else {
                    Rule::MaxLength(length)
                }
            }
            RuleType::Pattern => {
                let source = value()?
                    .as_str()
                    .ok_or_else(|| invalid("expected a pattern string"))?;
                let regex = compile_pattern(source).map_err(|e| invalid(&e.to_string()))?;
                Rule::Pattern(regex)
            }
        };

        Ok(Self::new(rule, spec.message.clone()))
    }

    /// Returns the compiled rule.
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Checks a value, returning the failure message if it does not pass.
    ///
    /// # Errors
    ///
    /// Returns the rule's message when the value fails.
    pub fn check(&self, field_type: FieldType, value: &FieldValue) -> Result<(), &str> {
        if self.rule.is_satisfied(field_type, value) {
            Ok(())
        } else {
            Err(&self.message)
        }
    }
}

/// Reads a length bound: a non-negative integer, or a float with no
/// fractional part (`3.0`).
fn length_value(value: &serde_json::Value) -> Option<usize> {
    if let Some(n) = value.as_u64() {
        return usize::try_from(n).ok();
    }
    let n = value.as_f64()?;
    if n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    format!("{n:.0}").parse().ok()
}

/// Compiles a pattern.
///
/// Accepts a bare expression (`^\d+$`) or a slash-delimited literal with
/// flags (`/^abc$/i`). Flags `i`, `m` and `s` map to inline regex flags;
/// `g`, `u` and `y` have no effect on a single match test.
fn compile_pattern(source: &str) -> Result<Regex, regex::Error> {
    if let Some(body) = source.strip_prefix('/') {
        if let Some(end) = body.rfind('/') {
            let (expr, flags) = (&body[..end], &body[end + 1..]);
            if flags.chars().all(|c| "gimsuy".contains(c)) {
                let inline: String = flags.chars().filter(|c| "ims".contains(*c)).collect();
                return if inline.is_empty() {
                    Regex::new(expr)
                } else {
                    Regex::new(&format!("(?{inline}){expr}"))
                };
            }
        }
    }
    Regex::new(source)
}

/// Evaluates every rule of a field in declared order.
///
/// Does not stop at the first failure; the result holds one message per
/// failing rule, in rule order. Empty means valid.
#[must_use]
pub fn validate_field(field: &Field, value: &FieldValue) -> Vec<String> {
    field
        .rules()
        .iter()
        .filter_map(|rule| rule.check(field.field_type(), value).err())
        .map(str::to_string)
        .collect()
}

/// Collection of validation errors by field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    /// Errors keyed by field name.
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Creates a new empty `ValidationErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error for a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Replaces the errors of a field; an empty list clears it.
    pub fn set(&mut self, field: &str, messages: Vec<String>) {
        if messages.is_empty() {
            self.errors.remove(field);
        } else {
            self.errors.insert(field.to_string(), messages);
        }
    }

    /// Removes the errors of a field.
    pub fn clear(&mut self, field: &str) {
        self.errors.remove(field);
    }

    /// Keeps only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.errors.retain(|field, _| keep(field));
    }

    /// Returns whether there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns errors for a specific field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    /// Iterates over fields with errors, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns all errors as a flat list.
    #[must_use]
    pub fn all_errors(&self) -> Vec<(&str, &str)> {
        self.errors
            .iter()
            .flat_map(|(field, messages)| {
                messages
                    .iter()
                    .map(move |msg| (field.as_str(), msg.as_str()))
            })
            .collect()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (field, messages) in &self.errors {
            for message in messages {
                writeln!(f, "{field}: {message}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, FormSchema, ValidatedSchema};
    use serde_json::json;

    fn rule(kind: RuleType, value: serde_json::Value) -> ValidationRule {
        ValidationRule::compile("f", &RuleSpec::with_value(kind, value, "failed")).unwrap()
    }

    fn passes(rule: &ValidationRule, value: impl Into<FieldValue>) -> bool {
        rule.check(FieldType::Text, &value.into()).is_ok()
    }

    #[test]
    fn test_required() {
        let r = ValidationRule::new(Rule::Required, "required");
        assert!(r.check(FieldType::Text, &FieldValue::Null).is_err());
        assert!(r.check(FieldType::Text, &"".into()).is_err());
        assert!(r.check(FieldType::Checkbox, &false.into()).is_err());
        assert!(r.check(FieldType::Checkbox, &true.into()).is_ok());
        assert!(r.check(FieldType::Text, &"x".into()).is_ok());
        assert!(r.check(FieldType::Number, &0.into()).is_ok());
    }

    #[test]
    fn test_min_max() {
        let min = rule(RuleType::Min, json!(18));
        let max = rule(RuleType::Max, json!(65.5));
        assert!(passes(&min, 18));
        assert!(!passes(&min, 17.9));
        assert!(passes(&max, 65.5));
        assert!(!passes(&max, 66));
        assert!(!passes(&min, "21"));
        assert!(!passes(&max, "21"));
        assert!(!passes(&min, "twenty"));
        assert!(!passes(&min, true));
        assert!(!passes(&min, FieldValue::Null));
        assert!(!passes(&max, FieldValue::Null));
    }

    #[test]
    fn test_lengths_count_characters() {
        let min = rule(RuleType::MinLength, json!(3));
        let max = rule(RuleType::MaxLength, json!(3));
        assert!(passes(&min, "abc"));
        assert!(!passes(&min, "ab"));
        assert!(passes(&max, "äöü"));
        assert!(!passes(&max, "abcd"));
        assert!(passes(&min, 123));
        assert!(!passes(&max, 1234));
    }

    #[test]
    fn test_pattern() {
        let r = rule(RuleType::Pattern, json!(r"^\d{4}-\d{2}-\d{2}$"));
        assert!(passes(&r, "2024-01-15"));
        assert!(!passes(&r, "not a date"));

        let literal = rule(RuleType::Pattern, json!("/^abc$/i"));
        assert!(passes(&literal, "ABC"));
        assert!(!passes(&literal, "abcd"));
    }

    #[test]
    fn test_email() {
        let r = ValidationRule::new(Rule::Email, "bad email");
        assert!(passes(&r, "user@example.com"));
        assert!(passes(&r, "user.name@domain.co.uk"));
        assert!(!passes(&r, "invalid"));
        assert!(!passes(&r, "@example.com"));
    }

    #[test]
    fn test_null_reads_as_empty_string() {
        for r in [
            rule(RuleType::MinLength, json!(2)),
            rule(RuleType::Pattern, json!("x")),
            ValidationRule::new(Rule::Email, "e"),
        ] {
            assert!(r.check(FieldType::Text, &FieldValue::Null).is_err());
        }
        for r in [
            rule(RuleType::MaxLength, json!(0)),
            rule(RuleType::MinLength, json!(0)),
            rule(RuleType::Pattern, json!("^$")),
        ] {
            assert!(r.check(FieldType::Text, &FieldValue::Null).is_ok());
        }
    }

    #[test]
    fn test_integral_float_lengths() {
        let min = rule(RuleType::MinLength, json!(3.0));
        assert!(matches!(min.rule(), Rule::MinLength(3)));
        assert!(passes(&min, "abc"));
        assert!(!passes(&min, "ab"));
        let max = rule(RuleType::MaxLength, json!(0.0));
        assert!(matches!(max.rule(), Rule::MaxLength(0)));
        for bad in [json!(2.5), json!(-1.0), json!(-1)] {
            let spec = RuleSpec::with_value(RuleType::MaxLength, bad, "m");
            assert!(ValidationRule::compile("f", &spec).is_err());
        }
    }

    #[test]
    fn test_compile_rejects_bad_values() {
        let bad = [
            RuleSpec::with_value(RuleType::Min, "ten", "m"),
            RuleSpec::new(RuleType::Max, "m"),
            RuleSpec::with_value(RuleType::MinLength, -1, "m"),
            RuleSpec::with_value(RuleType::MaxLength, 2.5, "m"),
            RuleSpec::with_value(RuleType::Pattern, "(unclosed", "m"),
            RuleSpec::with_value(RuleType::Pattern, 5, "m"),
        ];
        for spec in &bad {
            assert!(
                ValidationRule::compile("f", spec).is_err(),
                "expected {spec:?} to be rejected"
            );
        }
        assert_eq!(
            ValidationRule::compile("f", &RuleSpec::new(RuleType::Pattern, "m")).unwrap_err(),
            SchemaViolation::MissingRuleValue {
                field: "f".into(),
                rule: "pattern",
            }
        );
    }

    #[test]
    fn test_validate_field_keeps_every_message_in_order() {
        let schema = ValidatedSchema::load(
            FormSchema::new().field(
                FieldSchema::new(FieldType::Text, "code", "Code")
                    .rule(RuleSpec::with_value(RuleType::MinLength, 5, "too short"))
                    .rule(RuleSpec::with_value(RuleType::Pattern, "^[A-Z]+$", "uppercase only"))
                    .rule(RuleSpec::with_value(RuleType::MaxLength, 10, "too long")),
            ),
        )
        .unwrap();
        let field = schema.field("code").unwrap();

        assert_eq!(
            validate_field(field, &"ab".into()),
            vec!["too short".to_string(), "uppercase only".to_string()]
        );
        assert!(validate_field(field, &"ABCDEF".into()).is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("a", "one");
        errors.add("a", "two");
        errors.set("b", vec!["three".into()]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("a").unwrap(), ["one", "two"]);
        assert_eq!(errors.all_errors().len(), 3);

        errors.set("b", Vec::new());
        errors.retain(|f| f != "a");
        assert!(errors.is_empty());
    }
}
