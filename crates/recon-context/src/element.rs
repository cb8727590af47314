use serde::{Deserialize, Serialize};

/// One key/value attribute observed on an [`Occurrence`](crate) or demanded
/// as a requirement on a canonical entity's `required_context_elements`.
///
/// Unknown keys in the wire shape are ignored by `serde` (we don't use
/// `deny_unknown_fields`); missing optional keys take the defaults below.
/// Because every field is always materialized with its default, two
/// elements that differ only in "field omitted" vs "field set to default"
/// compare structurally equal once parsed — there is no separate
/// normalization step to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextElement {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub important: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, rename = "absence_allowed")]
    pub absence_allowed: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl ContextElement {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            important: false,
            weight: default_weight(),
            absence_allowed: false,
        }
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn absence_allowed(mut self, absence_allowed: bool) -> Self {
        self.absence_allowed = absence_allowed;
        self
    }
}

/// A context list as a multimap keyed by `key`, preserving input order.
/// Lookup returns the first matching element, matching spec behavior for
/// duplicate keys.
pub fn first_by_key<'a>(context: &'a [ContextElement], key: &str) -> Option<&'a ContextElement> {
    context.iter().find(|e| e.key == key)
}

/// Structural equality of two context lists: same length, same elements in
/// the same order. Used by the uniqueness checks in `recon-store` (via the
/// canonical JSON encoding) and directly here for in-process comparisons.
pub fn lists_structurally_equal(a: &[ContextElement], b: &[ContextElement]) -> bool {
    a == b
}

/// Deterministic JSON encoding of a context list, used as a storage key
/// fragment wherever the spec calls for "structurally-equal lists" to
/// collide in a uniqueness index. Field order is fixed by the struct
/// definition, so two structurally-equal lists always serialize identically.
pub fn canonical_key(context: &[ContextElement]) -> String {
    serde_json::to_string(context).expect("ContextElement serialization is infallible")
}
