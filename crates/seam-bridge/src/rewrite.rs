//! Merge resolved bridge links into the mapping file, preserving every
//! untouched line byte-for-byte.
//!
//! Strictly sequential: line order must survive, and each rewritten line
//! performs a linear secondary search for the bridge's own entry.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use seam_classfile::MemberRef;
use seam_mappings::{Line, MemberLine, TinyFile};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub lines_rewritten: usize,
    /// Rewrites that fell back to the bridge's literal library name
    /// because its own mapping entry could not be found.
    pub improvised: usize,
}

/// Write the corrected mapping file to `out`.
///
/// `bridged` maps each target to its resolved bridge, both expressed in
/// the library namespace (`library_ns`). Member lines whose identity in
/// that namespace is a bridged target get each corrective namespace's
/// name replaced by the name the bridge's own entry carries there; all
/// other lines are copied verbatim.
pub fn rewrite_mappings(
    file: &TinyFile,
    bridged: &HashMap<MemberRef, MemberRef>,
    library_ns: usize,
    corrective: &HashSet<usize>,
    out: &mut dyn Write,
) -> std::io::Result<RewriteStats> {
    let mut stats = RewriteStats::default();

    writeln!(out, "{}", file.header())?;
    for line in file.lines() {
        if let Line::Method(method_line) = line {
            let bridge = file
                .member_in(method_line, library_ns)
                .and_then(|jar_method| bridged.get(&jar_method));
            if let Some(bridge) = bridge {
                rewrite_line(file, method_line, bridge, library_ns, corrective, out, &mut stats)?;
                continue;
            }
        }
        writeln!(out, "{}", line.raw())?;
    }

    Ok(stats)
}

fn rewrite_line(
    file: &TinyFile,
    method_line: &MemberLine,
    bridge: &MemberRef,
    library_ns: usize,
    corrective: &HashSet<usize>,
    out: &mut dyn Write,
    stats: &mut RewriteStats,
) -> std::io::Result<()> {
    // The bridge's own entry, located by library-namespace name and
    // descriptor.
    let bridge_line = file.lines().iter().find_map(|line| match line {
        Line::Method(candidate) => {
            let member = file.member_in(candidate, library_ns)?;
            (member.name == bridge.name && member.descriptor == bridge.descriptor)
                .then_some(candidate)
        }
        _ => None,
    });

    if bridge_line.is_none() {
        stats.improvised += 1;
        tracing::warn!(
            bridge = %bridge,
            target = %method_line.native(),
            "bridge entry missing from mappings; improvising with its literal \
             library name for every corrective namespace"
        );
    }

    let native = method_line.native();
    write!(out, "METHOD\t{}\t{}", native.owner, native.descriptor)?;
    for id in 0..file.namespaces().len() {
        let name = if corrective.contains(&id) {
            match bridge_line {
                Some(line) => line.name(id),
                None => Some(bridge.name.as_str()),
            }
        } else {
            method_line.name(id)
        };
        out.write_all(b"\t")?;
        if let Some(name) = name {
            out.write_all(name.as_bytes())?;
        }
    }
    writeln!(out)?;

    stats.lines_rewritten += 1;
    Ok(())
}
