#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Budget-constrained body composition for newly produced agents.
//!
//! Given a role's desired part-ratio template and the colony's available
//! budget, [`compose`] produces a concrete part list that preserves the
//! template's relative proportions as closely as integer budget allows.

use colony_core::{BodyTemplate, Energy, PartKind};

/// Hard upper bound on the number of parts the host accepts in one body.
pub const MAX_AGENT_PARTS: usize = 50;

/// Computes an affordable concrete part list for the provided template.
///
/// The fill is a greedy round robin over [`PartKind::FILL_ORDER`]: each pass
/// tentatively grants one more part to every type still below its template
/// count, rolling back any increment that pushes the total cost over the
/// budget. The fill stops once every type reaches its template count, the
/// cost exactly meets the budget, or a full pass grants nothing.
///
/// The returned list is assembled in [`PartKind::ASSEMBLY_ORDER`], which is
/// significant to the host: defensive absorption parts sit first so they
/// soak damage, and the mobility part sits last. A budget too small for the
/// full template yields the largest affordable subset rather than an error;
/// an all-zero template yields an empty list.
#[must_use]
pub fn compose(template: &BodyTemplate, budget: Energy) -> Vec<PartKind> {
    let mut allocated = BodyTemplate::new();

    let mut exhausted = template.is_empty();
    while !exhausted {
        let mut granted_any = false;
        let mut at_exact_budget = false;

        for kind in PartKind::FILL_ORDER {
            if allocated.count(kind) >= template.count(kind) {
                continue;
            }

            let candidate = allocated.clone().with(kind, allocated.count(kind) + 1);
            let cost = candidate.cost();
            if cost > budget {
                continue;
            }

            allocated = candidate;
            granted_any = true;

            if cost == budget {
                at_exact_budget = true;
                break;
            }
        }

        exhausted = !granted_any || at_exact_budget || allocated == *template;
    }

    assemble(&allocated)
}

fn assemble(allocated: &BodyTemplate) -> Vec<PartKind> {
    let mut body = Vec::new();
    for kind in PartKind::ASSEMBLY_ORDER {
        for _ in 0..allocated.count(kind) {
            if body.len() < MAX_AGENT_PARTS {
                body.push(kind);
            }
        }
    }
    body
}
