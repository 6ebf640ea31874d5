//! Conditional visibility resolution.

use std::collections::HashSet;

use crate::schema::{FormData, ValidatedSchema};

/// The fields visible for one form data snapshot, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibleFields {
    ordered: Vec<String>,
    lookup: HashSet<String>,
}

impl VisibleFields {
    /// Returns whether the field is visible.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    /// Iterates over visible field names in schema order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    /// Returns the number of visible fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns whether no field is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Returns the visible names as a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.ordered.clone()
    }
}

/// Computes which fields are visible for `data`.
///
/// A field is visible when it has no conditional clause, or when the field
/// it is conditional on is itself visible and currently holds exactly the
/// expected value. `dependencies` never hide a field.
#[must_use]
pub fn resolve_visible(schema: &ValidatedSchema, data: &FormData) -> VisibleFields {
    let fields = schema.fields();
    let mut visible = vec![false; fields.len()];

    // Parents precede children in topological order.
    for &i in schema.graph().order() {
        visible[i] = match fields[i].conditional() {
            None => true,
            Some(conditional) => schema
                .position(&conditional.field)
                .is_some_and(|parent| visible[parent])
                && data.get(&conditional.field) == &conditional.value,
        };
    }

    let ordered: Vec<String> = fields
        .iter()
        .zip(&visible)
        .filter(|(_, shown)| **shown)
        .map(|(f, _)| f.name().to_string())
        .collect();
    let lookup = ordered.iter().cloned().collect();

    VisibleFields { ordered, lookup }
}
