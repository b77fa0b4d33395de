//! Dependency resolution: three-color DFS topological sort over hard
//! dependencies, with soft dependencies used only to bias ordering.

use std::collections::{HashMap, HashSet};

use crate::descriptor::UnitDescriptor;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// The result of resolving a set of discovered descriptors.
pub struct Resolution {
    /// Descriptors in a valid topological order over hard-dependency
    /// edges, with soft dependencies sorted earlier when present.
    pub order: Vec<UnitDescriptor>,
    /// `(unit_id, reason)` for every descriptor excluded from `order`,
    /// in the order exclusion was discovered.
    pub excluded: Vec<(String, String)>,
}

/// Resolves `descriptors` into a load order, excluding anything
/// involved in a dependency cycle or missing a hard dependency
/// (including transitively, through an excluded dependency).
pub fn resolve(descriptors: Vec<UnitDescriptor>) -> Resolution {
    let index: HashMap<String, UnitDescriptor> =
        descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();

    let mut ids: Vec<String> = index.keys().cloned().collect();
    ids.sort();

    let mut color: HashMap<String, Color> = ids.iter().map(|id| (id.clone(), Color::White)).collect();
    let mut order: Vec<String> = Vec::new();
    let mut excluded_ids: HashSet<String> = HashSet::new();
    let mut excluded: Vec<(String, String)> = Vec::new();

    for id in &ids {
        if color[id] == Color::White {
            let mut stack = Vec::new();
            visit(id, &index, &mut color, &mut order, &mut excluded_ids, &mut excluded, &mut stack);
        }
    }

    // Cascade: a unit whose hard dependency got excluded after this
    // unit was already accepted must itself be excluded, repeated to a
    // fixed point since exclusions can chain arbitrarily deep.
    loop {
        let mut changed = false;
        order.retain(|id| {
            let descriptor = &index[id];
            let ok = descriptor.hard_dependencies.iter().all(|dep| !excluded_ids.contains(dep));
            if !ok {
                tracing::warn!(unit_id = %id, "excluding unit: a hard dependency was excluded");
                if excluded_ids.insert(id.clone()) {
                    excluded.push((id.clone(), "a hard dependency was excluded".to_string()));
                }
                changed = true;
            }
            ok
        });
        if !changed {
            break;
        }
    }

    Resolution {
        order: order.into_iter().map(|id| index[&id].clone()).collect(),
        excluded,
    }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    id: &str,
    index: &HashMap<String, UnitDescriptor>,
    color: &mut HashMap<String, Color>,
    order: &mut Vec<String>,
    excluded_ids: &mut HashSet<String>,
    excluded: &mut Vec<(String, String)>,
    stack: &mut Vec<String>,
) {
    color.insert(id.to_string(), Color::Gray);
    stack.push(id.to_string());

    let descriptor = &index[id];
    // Soft deps visited first so their providers, when present, land
    // earlier in the final order -- a hint, not a gate.
    for dep in descriptor.soft_dependencies.iter().chain(descriptor.hard_dependencies.iter()) {
        let Some(_) = index.get(dep) else {
            if descriptor.hard_dependencies.contains(dep) {
                tracing::warn!(unit_id = id, dependency = %dep, "excluding unit: missing hard dependency");
                if excluded_ids.insert(id.to_string()) {
                    excluded.push((id.to_string(), format!("missing hard dependency {dep}")));
                }
            }
            continue;
        };

        match color.get(dep).copied().unwrap_or(Color::White) {
            Color::White => visit(dep, index, color, order, excluded_ids, excluded, stack),
            Color::Gray => {
                let pos = stack.iter().position(|x| x == dep).expect("gray node must be on stack");
                let cycle: Vec<String> = stack[pos..].to_vec();
                tracing::warn!(cycle = ?cycle, "excluding units: dependency cycle detected");
                for member in &cycle {
                    if excluded_ids.insert(member.clone()) {
                        excluded.push((member.clone(), "part of a dependency cycle".to_string()));
                    }
                }
            }
            Color::Black => {}
        }
    }

    stack.pop();
    color.insert(id.to_string(), Color::Black);
    if !excluded_ids.contains(id) {
        order.push(id.to_string());
    }
}
