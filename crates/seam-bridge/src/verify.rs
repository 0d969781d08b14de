//! Instruction-level proof that a shortlisted method is a trivial
//! forwarding stub.
//!
//! One [`BridgeState`] per in-flight candidate: a handful of flags and a
//! per-slot load bitset, driven once over the method's instruction
//! stream. Invalidation is one-way; after it, no instruction is
//! interpreted further for that method.

use std::collections::HashMap;

use seam_classfile::{
    is_bridge, parse_method_descriptor, visibility_bits, ClassFile, Code, Insn, Instructions,
    InvokeKind, MemberRef, MethodDescriptor, ReturnType,
};
use seam_jar::{ClassEntry, ClassIndex};

use crate::candidates::Candidate;
use crate::hierarchy::related_types;

pub(crate) struct BridgeState {
    bridge: MemberRef,
    access_flags: u16,
    descriptor: MethodDescriptor,
    /// Local slots a correctly-shaped stub uses: receiver plus arguments.
    local_slots: usize,
    /// Expected frame size: the stub needs no stack or locals beyond its
    /// arguments (or a wide return value).
    frame_size: u16,
    seen_slot: Vec<bool>,
    seen_return: bool,
    callee: Option<MemberRef>,
    valid: bool,
    interface_owner: bool,
}

impl BridgeState {
    pub(crate) fn new(candidate: &Candidate, interface_owner: bool) -> Option<Self> {
        let descriptor = match parse_method_descriptor(&candidate.member.descriptor) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::warn!(
                    method = %candidate.member,
                    error = %err,
                    "candidate has an unparsable descriptor"
                );
                return None;
            }
        };

        let local_slots = 1 + descriptor.param_slots() as usize;
        let frame_size = (local_slots as u16).max(descriptor.return_type.slot_size());

        let mut seen_slot = vec![false; local_slots];
        // The second slot of a long or double argument is never loaded
        // directly; mark it up front so the all-slots check passes.
        let mut slot = 1usize;
        for param in &descriptor.params {
            let size = param.slot_size() as usize;
            if size == 2 {
                seen_slot[slot + 1] = true;
            }
            slot += size;
        }

        Some(Self {
            bridge: candidate.member.clone(),
            access_flags: candidate.access_flags,
            descriptor,
            local_slots,
            frame_size,
            seen_slot,
            seen_return: false,
            callee: None,
            valid: true,
            interface_owner,
        })
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    pub(crate) fn step(&mut self, insn: &Insn, entry: &ClassEntry, index: &ClassIndex) {
        if !self.valid {
            return;
        }

        match insn {
            Insn::Return => {
                if self.seen_return {
                    self.invalidate();
                } else {
                    self.seen_return = true;
                }
            }
            Insn::Load { slot } => {
                let slot = *slot as usize;
                if slot >= self.local_slots || self.seen_slot[slot] {
                    self.invalidate();
                } else {
                    self.seen_slot[slot] = true;
                }
            }
            // Narrowing casts are part of the stub shape.
            Insn::Type { cast: true } => {}
            Insn::Invoke { kind, member } => self.step_invoke(*kind, member, entry, index),
            Insn::Store | Insn::Type { cast: false } | Insn::Other => self.invalidate(),
        }
    }

    fn step_invoke(
        &mut self,
        kind: InvokeKind,
        member: &MemberRef,
        entry: &ClassEntry,
        index: &ClassIndex,
    ) {
        if self.callee.is_some() {
            self.invalidate();
            return;
        }
        self.callee = Some(member.clone());

        let expected = if self.interface_owner {
            InvokeKind::Interface
        } else {
            InvokeKind::Virtual
        };
        if kind != expected {
            self.invalidate();
            return;
        }

        // The stub forwards to a method on its own class.
        if member.owner != self.bridge.owner {
            self.invalidate();
            return;
        }

        // An inherited method claimed on the owner isn't a declared
        // narrowing override.
        let Some(target) = entry.method(&member.name, &member.descriptor) else {
            self.invalidate();
            return;
        };

        // Identical signatures make this an accessor, not a bridge.
        if member.descriptor == self.bridge.descriptor {
            self.invalidate();
            return;
        }

        let Ok(target_desc) = parse_method_descriptor(&member.descriptor) else {
            self.invalidate();
            return;
        };
        if target_desc.params.len() != self.descriptor.params.len() {
            self.invalidate();
            return;
        }
        for (target_param, bridge_param) in target_desc.params.iter().zip(&self.descriptor.params) {
            if !related_types(index, target_param, bridge_param) {
                self.invalidate();
                return;
            }
        }
        let returns_related = match (&target_desc.return_type, &self.descriptor.return_type) {
            (ReturnType::Void, ReturnType::Void) => true,
            (ReturnType::Type(target), ReturnType::Type(bridge)) => {
                related_types(index, target, bridge)
            }
            _ => false,
        };
        if !returns_related {
            self.invalidate();
            return;
        }

        // The bridged method's visibility should match the bridge's own.
        if visibility_bits(target.access_flags) != visibility_bits(self.access_flags) {
            self.invalidate();
        }
    }

    /// End-of-method judgement: the target triple, or `None`.
    pub(crate) fn finish(mut self, code: &Code) -> Option<MemberRef> {
        if code.exception_handlers != 0 {
            self.invalidate();
        }
        // All arguments are loaded straight onto the stack, so a real
        // stub's frame is exactly argument-sized.
        if code.max_stack != code.max_locals || code.max_locals != self.frame_size {
            self.invalidate();
        }
        if !self.seen_return || !self.seen_slot.iter().all(|seen| *seen) {
            self.invalidate();
        }

        if self.valid {
            self.callee
        } else {
            None
        }
    }
}

/// Verify every shortlisted candidate of one class against its bytecode.
/// Returns a `bridge -> target` link per confirmed stub.
pub fn verify_class(
    class: &ClassFile,
    entry: &ClassEntry,
    index: &ClassIndex,
    candidates: &[Candidate],
) -> Vec<(MemberRef, MemberRef)> {
    let interface_owner = entry.is_interface();
    let by_signature: HashMap<(&str, &str), &Candidate> = candidates
        .iter()
        .map(|c| ((c.member.name.as_str(), c.member.descriptor.as_str()), c))
        .collect();

    let mut links = Vec::new();
    let mut confirmed = std::collections::HashSet::new();

    for method in &class.methods {
        let Some(candidate) = by_signature.get(&(method.name.as_str(), method.descriptor.as_str()))
        else {
            continue;
        };
        // Abstract methods have no body to be a stub of.
        let Some(code) = &method.code else {
            continue;
        };
        let Some(mut state) = BridgeState::new(candidate, interface_owner) else {
            continue;
        };

        let mut decode_failed = false;
        for insn in Instructions::new(&code.bytecode, &class.constant_pool) {
            match insn {
                Ok(insn) => state.step(&insn, entry, index),
                Err(err) => {
                    tracing::warn!(
                        method = %candidate.member,
                        error = %err,
                        "undecodable bytecode; candidate rejected"
                    );
                    decode_failed = true;
                    break;
                }
            }
        }
        if decode_failed {
            continue;
        }

        if let Some(target) = state.finish(code) {
            confirmed.insert(candidate.member.clone());
            links.push((candidate.member.clone(), target));
        }
    }

    // The classfile's own heuristic disagreeing with ours is worth an
    // audit trail either way.
    for candidate in candidates {
        if is_bridge(candidate.access_flags) && !confirmed.contains(&candidate.member) {
            tracing::warn!(
                method = %candidate.member,
                "bridge-flagged method failed delegation verification"
            );
        }
    }

    links
}
