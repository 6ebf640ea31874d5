//! Form schema model.
//!
//! [`FormSchema`] is the declarative, serde-facing description of a form.
//! [`ValidatedSchema::load`] checks it once and compiles it into the
//! immutable structure the engine works on.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FormError, Result, SchemaError, SchemaViolation};
use crate::graph::DependencyGraph;
use crate::validation::{Rule, ValidationRule};
use crate::visibility::VisibleFields;

/// Default message for the `required: true` shorthand.
pub const DEFAULT_REQUIRED_MESSAGE: &str = "This field is required.";

/// The closed set of field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Email,
    Password,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Date,
}

impl FieldType {
    /// Returns whether the field picks its value from `options`.
    #[must_use]
    pub const fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }

    /// Returns the schema name of this field type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Email => "email",
            Self::Password => "password",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value.
///
/// Comparison is strict: values of different variants are never equal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// No value.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

static NULL: FieldValue = FieldValue::Null;

impl FieldValue {
    /// Returns whether this is [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the number held by a [`FieldValue::Number`].
    ///
    /// Strings are never parsed: `"21"` is text, not a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Null | Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Returns the string form used by length, pattern and email rules.
    #[must_use]
    pub fn display_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One choice of a select or radio field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: FieldValue,
}

impl FieldOption {
    /// Creates an option.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// "Visible only when `field` currently equals `value`."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConditional {
    pub field: String,
    pub value: FieldValue,
}

/// Rule kinds as written in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleType {
    Required,
    Min,
    Max,
    MinLength,
    MaxLength,
    Pattern,
    Email,
}

impl RuleType {
    /// Returns the schema name of this rule kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Min => "min",
            Self::Max => "max",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Pattern => "pattern",
            Self::Email => "email",
        }
    }
}

/// A validation rule as declared in a schema, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub kind: RuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub message: String,
}

impl RuleSpec {
    /// Creates a rule without a value.
    #[must_use]
    pub fn new(kind: RuleType, message: impl Into<String>) -> Self {
        Self {
            kind,
            value: None,
            message: message.into(),
        }
    }

    /// Creates a rule with a value.
    #[must_use]
    pub fn with_value(
        kind: RuleType,
        value: impl Into<serde_json::Value>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            value: Some(value.into()),
            message: message.into(),
        }
    }
}

/// Declarative description of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Shorthand for a leading `required` rule.
    #[serde(default)]
    pub required: bool,
    /// Disabled fields reject input through the engine.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<RuleSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<FieldConditional>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u32>,
}

impl FieldSchema {
    /// Creates a field with no options, rules or conditions.
    #[must_use]
    pub fn new(field_type: FieldType, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field_type,
            name: name.into(),
            label: label.into(),
            placeholder: None,
            required: false,
            disabled: false,
            default_value: None,
            options: Vec::new(),
            validation: Vec::new(),
            dependencies: Vec::new(),
            conditional: None,
            rows: None,
            cols: None,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Disables the field.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Adds an option.
    #[must_use]
    pub fn option(mut self, label: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.options.push(FieldOption::new(label, value));
        self
    }

    /// Adds a validation rule.
    #[must_use]
    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.validation.push(rule);
        self
    }

    /// Adds a dependency on another field.
    #[must_use]
    pub fn depends_on(mut self, field: impl Into<String>) -> Self {
        self.dependencies.push(field.into());
        self
    }

    /// Shows the field only when `field` equals `value`.
    #[must_use]
    pub fn visible_when(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditional = Some(FieldConditional {
            field: field.into(),
            value: value.into(),
        });
        self
    }
}

/// Submit button metadata, passed through to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<bool>,
}

/// Declarative description of a whole form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_button: Option<SubmitButton>,
}

impl FormSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Parses a schema from JSON.
    ///
    /// # Errors
    ///
    /// Fails when the text is not a well-formed schema document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Current values, keyed by field name.
///
/// Missing keys read as [`FieldValue::Null`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(BTreeMap<String, FieldValue>);

impl FormData {
    /// Creates empty form data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a field, `Null` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &FieldValue {
        self.0.get(name).unwrap_or(&NULL)
    }

    /// Returns whether a value was stored for the field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Stores a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    /// Iterates over stored values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy holding only the visible fields.
    #[must_use]
    pub fn restricted_to(&self, visible: &VisibleFields) -> Self {
        self.0
            .iter()
            .filter(|(name, _)| visible.contains(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl FromIterator<(String, FieldValue)> for FormData {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<FieldValue>, const N: usize> From<[(K, V); N]> for FormData {
    fn from(entries: [(K, V); N]) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect()
    }
}

/// A field after loading: its declaration plus compiled rules.
#[derive(Debug, Clone)]
pub struct Field {
    schema: FieldSchema,
    rules: Vec<ValidationRule>,
}

impl Field {
    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Returns the field type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.schema.field_type
    }

    /// Returns the compiled rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Returns the conditional clause, if any.
    #[must_use]
    pub fn conditional(&self) -> Option<&FieldConditional> {
        self.schema.conditional.as_ref()
    }

    /// Returns the original declaration.
    #[must_use]
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }
}

/// A schema that passed every load-time check.
///
/// Immutable; share it between engines with an `Arc`.
#[derive(Debug, Clone)]
pub struct ValidatedSchema {
    title: Option<String>,
    description: Option<String>,
    submit_button: Option<SubmitButton>,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    graph: DependencyGraph,
}

impl ValidatedSchema {
    /// Checks and compiles a schema.
    ///
    /// Every violation is collected before failing. Cycles are only looked
    /// for once the schema is otherwise consistent.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Schema`] listing every violation, or
    /// [`FormError::CyclicDependency`] when fields depend on each other.
    pub fn load(schema: FormSchema) -> Result<Self> {
        let mut violations = Vec::new();
        let mut index = HashMap::with_capacity(schema.fields.len());

        for (i, field) in schema.fields.iter().enumerate() {
            if field.name.is_empty() {
                violations.push(SchemaViolation::EmptyName { index: i });
                continue;
            }
            match index.entry(field.name.clone()) {
                Entry::Occupied(_) => {
                    violations.push(SchemaViolation::DuplicateField(field.name.clone()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(i);
                }
            }
        }

        let mut fields = Vec::with_capacity(schema.fields.len());
        for field in schema.fields {
            check_references(&field, &index, &mut violations);
            check_options(&field, &mut violations);
            let rules = compile_rules(&field, &mut violations);
            fields.push(Field {
                schema: field,
                rules,
            });
        }

        if !violations.is_empty() {
            debug!(count = violations.len(), "schema rejected");
            return Err(FormError::Schema(SchemaError { violations }));
        }

        let declarations: Vec<&FieldSchema> = fields.iter().map(Field::schema).collect();
        let graph = DependencyGraph::build(&declarations)?;

        debug!(
            title = schema.title.as_deref().unwrap_or(""),
            fields = fields.len(),
            "schema loaded"
        );

        Ok(Self {
            title: schema.title,
            description: schema.description,
            submit_button: schema.submit_button,
            fields,
            index,
            graph,
        })
    }

    /// Returns the form title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the form description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the submit button metadata.
    #[must_use]
    pub fn submit_button(&self) -> Option<&SubmitButton> {
        self.submit_button.as_ref()
    }

    /// Returns the fields in schema order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the schema position of a field.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns the dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Builds the initial form data: defaults overlaid by `initial`.
    ///
    /// Entries of `initial` naming unknown fields are dropped.
    #[must_use]
    pub fn initial_data(&self, initial: Option<FormData>) -> FormData {
        let mut data: FormData = self
            .fields
            .iter()
            .filter_map(|f| {
                f.schema
                    .default_value
                    .clone()
                    .map(|v| (f.name().to_string(), v))
            })
            .collect();
        if let Some(initial) = initial {
            for (name, value) in initial.0 {
                if self.index.contains_key(&name) {
                    data.insert(name, value);
                }
            }
        }
        data
    }
}

fn check_references(
    field: &FieldSchema,
    index: &HashMap<String, usize>,
    violations: &mut Vec<SchemaViolation>,
) {
    for dependency in &field.dependencies {
        if !index.contains_key(dependency) {
            violations.push(SchemaViolation::UnknownDependency {
                field: field.name.clone(),
                dependency: dependency.clone(),
            });
        }
    }
    if let Some(conditional) = &field.conditional {
        if !index.contains_key(&conditional.field) {
            violations.push(SchemaViolation::UnknownConditionalField {
                field: field.name.clone(),
                target: conditional.field.clone(),
            });
        }
    }
}

fn check_options(field: &FieldSchema, violations: &mut Vec<SchemaViolation>) {
    if !field.field_type.has_options() {
        return;
    }
    if field.options.is_empty() {
        violations.push(SchemaViolation::MissingOptions(field.name.clone()));
        return;
    }

    // f64 is not Hash; the JSON rendering is a faithful key for option values.
    let mut seen = HashSet::new();
    for option in &field.options {
        let key = serde_json::to_string(&option.value).unwrap_or_default();
        if !seen.insert(key.clone()) {
            violations.push(SchemaViolation::DuplicateOption {
                field: field.name.clone(),
                value: key,
            });
        }
    }

    if let Some(default) = &field.default_value {
        if !default.is_null() && !field.options.iter().any(|o| &o.value == default) {
            violations.push(SchemaViolation::DefaultNotInOptions(field.name.clone()));
        }
    }
}

fn compile_rules(field: &FieldSchema, violations: &mut Vec<SchemaViolation>) -> Vec<ValidationRule> {
    let mut rules = Vec::with_capacity(field.validation.len() + 1);

    let has_required_rule = field
        .validation
        .iter()
        .any(|r| r.kind == RuleType::Required);
    if field.required && !has_required_rule {
        rules.push(ValidationRule::new(Rule::Required, DEFAULT_REQUIRED_MESSAGE));
    }

    for spec in &field.validation {
        match ValidationRule::compile(&field.name, spec) {
            Ok(rule) => rules.push(rule),
            Err(violation) => violations.push(violation),
        }
    }
    rules
}
