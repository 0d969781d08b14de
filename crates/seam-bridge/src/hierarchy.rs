//! Type-hierarchy covariance queries over the library's class index.
//!
//! These walks deliberately consult only the library's own classes: an
//! unknown side degrades to the permissive answer rather than pulling in
//! virtual entries.

use seam_classfile::FieldType;
use seam_jar::{ClassEntry, ClassIndex};

const OBJECT: &str = "java/lang/Object";

fn object_name(ty: &FieldType) -> Option<&str> {
    match ty {
        FieldType::Object(name) => Some(name),
        _ => None,
    }
}

/// Whether `ty` equals `parent` or narrows it: `parent` is `Object`, or a
/// strict ancestor of `ty` in the superclass chain / transitive interface
/// set. Arrays only narrow from `Object`; primitives never narrow.
pub fn related_types(index: &ClassIndex, ty: &FieldType, parent: &FieldType) -> bool {
    if ty == parent {
        return true;
    }
    if matches!(ty, FieldType::Base(_)) {
        return false;
    }

    let Some(parent_name) = object_name(parent) else {
        return false;
    };
    if parent_name == OBJECT {
        return true;
    }
    let Some(ty_name) = object_name(ty) else {
        return false;
    };

    let Some(origin) = index.get(ty_name) else {
        return true; // Out-of-library types get the benefit of the doubt.
    };
    let Some(target) = index.get(parent_name) else {
        return true;
    };
    has_ancestor(index, origin, target)
}

/// Whether `subject` is the more-derived ("younger") of two differing
/// types. `Object` is always the oldest; a type without hierarchy
/// information is treated as the younger of the pair.
pub fn is_younger(index: &ClassIndex, subject: &FieldType, other: &FieldType) -> bool {
    debug_assert_ne!(subject, other);

    if object_name(other) == Some(OBJECT) {
        return true;
    }
    if object_name(subject) == Some(OBJECT) {
        return false;
    }

    let (Some(subject_name), Some(other_name)) = (object_name(subject), object_name(other)) else {
        // Arrays and primitives have no walkable hierarchy here.
        return true;
    };
    let Some(origin) = index.get(subject_name) else {
        return true;
    };
    let Some(target) = index.get(other_name) else {
        return false;
    };
    has_ancestor(index, origin, target)
}

/// Whether `target` appears among `origin`'s superclasses (class targets)
/// or its transitive interface set (interface targets).
fn has_ancestor(index: &ClassIndex, origin: &ClassEntry, target: &ClassEntry) -> bool {
    if !target.is_interface() {
        let mut parent = index.super_class_of(origin);
        while let Some(entry) = parent {
            if entry.internal_name == target.internal_name {
                return true;
            }
            parent = index.super_class_of(entry);
        }
        false
    } else {
        index
            .all_interfaces(origin)
            .iter()
            .any(|itf| itf.internal_name == target.internal_name)
    }
}
