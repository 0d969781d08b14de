//! Structural shortlisting of bridge-shaped methods.
//!
//! Uses hierarchy metadata only; no method body is read here. A bridge
//! always overrides something, so a method with no same-signature
//! ancestor can only ever be the narrowing target.

use std::collections::VecDeque;

use seam_classfile::{is_bridge, is_final, is_private_or_static, MemberRef};
use seam_jar::{ClassEntry, MethodEntry, VirtualResolver};

/// Per-class candidate sets. The two sets are disjoint.
#[derive(Debug, Default)]
pub struct Candidates {
    pub potential_bridges: Vec<Candidate>,
    pub potentially_bridged: Vec<MemberRef>,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub member: MemberRef,
    pub access_flags: u16,
}

pub fn classify(class: &ClassEntry, resolver: &VirtualResolver<'_>) -> Candidates {
    let mut out = Candidates::default();

    for method in &class.methods {
        let member = MemberRef::new(
            class.internal_name.clone(),
            method.name.clone(),
            method.descriptor.clone(),
        );

        // Bridges always have a parent and won't be made final by the
        // compiler. Narrowing targets shouldn't ever have one, though an
        // unrelated interface can still provide it.
        if !is_final(method.access_flags) && has_parent(class, method, resolver) {
            out.potential_bridges.push(Candidate {
                member,
                access_flags: method.access_flags,
            });
        } else {
            if is_bridge(method.access_flags) {
                tracing::warn!(
                    method = %member,
                    "bridge-flagged method has no overridable ancestor"
                );
            }
            out.potentially_bridged.push(member);
        }
    }

    out
}

/// Whether a same-name/descriptor method is reachable on the superclass
/// chain or the transitive interface set, consulting virtual entries for
/// classes outside the library.
fn has_parent(class: &ClassEntry, method: &MethodEntry, resolver: &VirtualResolver<'_>) -> bool {
    if is_private_or_static(method.access_flags) {
        return false;
    }

    let mut parent = class.super_class.clone();
    while let Some(name) = parent {
        let Some(entry) = resolver.resolve(&name) else {
            break;
        };
        if entry.has_method(&method.name, &method.descriptor) {
            return true;
        }
        parent = entry.super_class.clone();
    }

    let mut queue: VecDeque<String> = class.interfaces.iter().cloned().collect();
    let mut seen = std::collections::HashSet::new();
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(entry) = resolver.resolve(&name) else {
            continue;
        };
        if entry.has_method(&method.name, &method.descriptor) {
            return true;
        }
        queue.extend(entry.interfaces.iter().cloned());
    }

    false
}
