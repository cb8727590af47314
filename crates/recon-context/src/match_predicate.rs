use crate::element::ContextElement;

/// Result of matching an observation's context against a candidate's
/// required context elements: whether the requirement set is satisfied,
/// and the accumulated weight of elements that matched on value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMatch {
    pub matches: bool,
    pub score: f64,
}

/// Walk `required` in order against `observed`, applying the per-element
/// rule:
///
/// - requirement key absent from `observed`: succeeds iff `absence_allowed`,
///   otherwise the whole match fails immediately.
/// - requirement key present with an equal value: add `weight` to the score.
/// - requirement key present with a different value and `important`: fail.
/// - requirement key present with a different value, not `important`:
///   continue, no score added.
///
/// Deterministic and total; an empty `required` always matches with score 0.
pub fn match_context(observed: &[ContextElement], required: &[ContextElement]) -> ContextMatch {
    let mut score = 0.0;

    for requirement in required {
        match crate::element::first_by_key(observed, &requirement.key) {
            None => {
                if !requirement.absence_allowed {
                    return ContextMatch {
                        matches: false,
                        score: 0.0,
                    };
                }
            }
            Some(observed_elem) => {
                if observed_elem.value == requirement.value {
                    score += requirement.weight;
                } else if requirement.important {
                    return ContextMatch {
                        matches: false,
                        score: 0.0,
                    };
                }
            }
        }
    }

    ContextMatch {
        matches: true,
        score,
    }
}
