//! Collapse the raw `bridge -> target` links to one bridge per target.
//!
//! A target claimed by two bridges was narrowed along two independent
//! dimensions (typically two interfaces widening the same method). The
//! surviving bridge is the one whose first-differing descriptor type is
//! the ancestor: the widest declaration is the name the whole override
//! chain shares.

use std::collections::{HashMap, HashSet};

use seam_classfile::{parse_method_descriptor, FieldType, MemberRef, ReturnType};
use seam_jar::ClassIndex;

use crate::hierarchy::is_younger;

#[derive(Debug, Default)]
pub struct Resolution {
    /// `target -> bridge`, at most one bridge per target.
    pub bridged: HashMap<MemberRef, MemberRef>,
    /// Targets dropped because no differing descriptor position could
    /// order their claimants.
    pub unresolved: usize,
}

pub fn resolve(index: &ClassIndex, links: &HashMap<MemberRef, MemberRef>) -> Resolution {
    // Deterministic merge order regardless of map iteration.
    let mut ordered: Vec<(&MemberRef, &MemberRef)> = links.iter().collect();
    ordered.sort_by(|(a, _), (b, _)| {
        (&a.owner, &a.name, &a.descriptor).cmp(&(&b.owner, &b.name, &b.descriptor))
    });

    let mut resolution = Resolution::default();
    let mut poisoned: HashSet<MemberRef> = HashSet::new();

    for (bridge, target) in ordered {
        if poisoned.contains(target) {
            resolution.unresolved += 1;
            continue;
        }
        match resolution.bridged.entry(target.clone()) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(bridge.clone());
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                debug_assert_eq!(slot.get().owner, bridge.owner);

                match pick(index, slot.get(), bridge) {
                    Some(winner) => {
                        let winner = winner.clone();
                        slot.insert(winner);
                    }
                    None => {
                        tracing::error!(
                            target = %target,
                            left = %slot.get(),
                            right = %bridge,
                            "cannot order bridge claimants; target excluded"
                        );
                        slot.remove();
                        poisoned.insert(target.clone());
                        resolution.unresolved += 1;
                    }
                }
            }
        }
    }

    resolution
}

/// The claimant to keep, or `None` when no descriptor position differs.
fn pick<'a>(
    index: &ClassIndex,
    left: &'a MemberRef,
    right: &'a MemberRef,
) -> Option<&'a MemberRef> {
    let left_desc = parse_method_descriptor(&left.descriptor).ok()?;
    let right_desc = parse_method_descriptor(&right.descriptor).ok()?;

    if let (ReturnType::Type(left_return), ReturnType::Type(right_return)) =
        (&left_desc.return_type, &right_desc.return_type)
    {
        if left_return != right_return {
            return Some(older(index, left, left_return, right, right_return));
        }
    }

    debug_assert_eq!(left_desc.params.len(), right_desc.params.len());
    for (left_param, right_param) in left_desc.params.iter().zip(&right_desc.params) {
        if left_param != right_param {
            return Some(older(index, left, left_param, right, right_param));
        }
    }

    None
}

fn older<'a>(
    index: &ClassIndex,
    left: &'a MemberRef,
    left_ty: &FieldType,
    right: &'a MemberRef,
    right_ty: &FieldType,
) -> &'a MemberRef {
    if is_younger(index, left_ty, right_ty) {
        right
    } else {
        left
    }
}
