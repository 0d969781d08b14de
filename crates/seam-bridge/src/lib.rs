//! Bridge-method detection and mapping correction for a compiled class
//! library.
//!
//! The run is staged leaf-first: structural candidate selection and
//! instruction-level delegation verification (parallel per class),
//! covariance disambiguation (single-threaded), a direct-reference
//! cross-check (parallel), and the sequential line-preserving mapping
//! rewrite.

#![forbid(unsafe_code)]

mod candidates;
mod disambiguate;
mod hierarchy;
mod rewrite;
mod verify;

pub use crate::candidates::{classify, Candidate, Candidates};
pub use crate::disambiguate::{resolve, Resolution};
pub use crate::rewrite::{rewrite_mappings, RewriteStats};
pub use crate::verify::verify_class;

use std::collections::{HashMap, HashSet};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use seam_classfile::{ClassFile, Insn, Instructions, MemberRef};
use seam_jar::{Archive, ClassEntry, ClassIndex, JarError, VirtualResolver};
use seam_mappings::{MappingError, TinyFile};

#[derive(Debug, Clone)]
pub struct FixBridgesConfig {
    pub library: PathBuf,
    pub mappings_in: PathBuf,
    pub mappings_out: PathBuf,
    /// The namespace carrying the library's native names.
    pub library_namespace: String,
    /// Namespaces whose names get corrected to the bridge's own.
    pub corrective_namespaces: Vec<String>,
    /// Only analyze classes under this internal-name prefix; vendored
    /// code is excluded by leaving it outside the prefix.
    pub filter_prefix: Option<String>,
    /// Extra archives for synthesizing virtual entries (platform
    /// classes, undeclared dependencies).
    pub classpath: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Jar(#[from] JarError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("output file already exists: {0}")]
    OutputExists(PathBuf),
}

/// Machine-readable run summary.
#[derive(Debug, Default, Serialize)]
pub struct Outcome {
    pub classes_indexed: usize,
    pub classes_analyzed: usize,
    pub bridges_found: usize,
    pub resolved_targets: usize,
    /// Target methods excluded because their bridge claimants could not
    /// be ordered; a non-zero count makes the run exit unsuccessfully.
    pub unresolved_targets: usize,
    pub direct_references: usize,
    pub lines_rewritten: usize,
    pub improvised_rewrites: usize,
    /// True when no bridges were found and the output is a verbatim copy.
    pub copied_verbatim: bool,
}

pub fn fix_bridges(config: &FixBridgesConfig) -> Result<Outcome, BridgeError> {
    let archive = Archive::new(&config.library);
    let index = ClassIndex::build(&archive)?;
    tracing::info!(classes = index.len(), "indexed library");

    // Parse the mappings before any analysis so input errors abort the
    // run with nothing written.
    let mappings = TinyFile::read(&config.mappings_in)?;
    let library_ns = mappings.require_namespace(&config.library_namespace)?;
    let mut corrective = HashSet::new();
    for namespace in &config.corrective_namespaces {
        corrective.insert(mappings.require_namespace(namespace)?);
    }

    let sources: Vec<Archive> = config.classpath.iter().map(Archive::new).collect();
    let resolver = VirtualResolver::new(&index, sources);

    let mut classes: Vec<Arc<ClassEntry>> = index.iter().cloned().collect();
    classes.sort_by(|a, b| a.internal_name.cmp(&b.internal_name));

    let analyzed: Vec<&Arc<ClassEntry>> = classes
        .iter()
        .filter(|class| match &config.filter_prefix {
            Some(prefix) => class.internal_name.starts_with(prefix.as_str()),
            None => true,
        })
        .collect();

    tracing::info!(classes = analyzed.len(), "looking for bridges");
    let links: HashMap<MemberRef, MemberRef> = analyzed
        .par_iter()
        .flat_map_iter(|class| analyze_class(&archive, &index, &resolver, class))
        .collect();

    let mut outcome = Outcome {
        classes_indexed: index.len(),
        classes_analyzed: analyzed.len(),
        bridges_found: links.len(),
        ..Outcome::default()
    };

    if links.is_empty() {
        tracing::info!("unable to find any bridges in the library");
        if config.mappings_out.exists() {
            return Err(BridgeError::OutputExists(config.mappings_out.clone()));
        }
        std::fs::copy(&config.mappings_in, &config.mappings_out)?;
        outcome.copied_verbatim = true;
        return Ok(outcome);
    }

    let resolution = resolve(&index, &links);
    outcome.resolved_targets = resolution.bridged.len();
    outcome.unresolved_targets = resolution.unresolved;

    let bridge_set: HashSet<&MemberRef> = resolution.bridged.values().collect();
    tracing::info!(bridges = bridge_set.len(), "verifying found bridges");
    outcome.direct_references = classes
        .par_iter()
        .map(|class| scan_direct_references(&archive, class, &bridge_set))
        .sum();

    tracing::info!("verification complete, writing mapping file");
    let out = std::fs::File::options()
        .write(true)
        .create_new(true)
        .open(&config.mappings_out)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::AlreadyExists => {
                BridgeError::OutputExists(config.mappings_out.clone())
            }
            _ => BridgeError::Io(err),
        })?;
    let mut writer = BufWriter::new(out);
    let stats = rewrite_mappings(
        &mappings,
        &resolution.bridged,
        library_ns,
        &corrective,
        &mut writer,
    )?;
    writer.flush()?;

    outcome.lines_rewritten = stats.lines_rewritten;
    outcome.improvised_rewrites = stats.improvised;
    Ok(outcome)
}

/// Candidate selection plus delegation verification for one class.
/// Failures here degrade to "no links from this class".
fn analyze_class(
    archive: &Archive,
    index: &ClassIndex,
    resolver: &VirtualResolver<'_>,
    class: &ClassEntry,
) -> Vec<(MemberRef, MemberRef)> {
    let candidates = classify(class, resolver);
    // Most classes contain no bridges; skip the bytecode pass entirely.
    if candidates.potential_bridges.is_empty() {
        return Vec::new();
    }

    let Some(parsed) = read_class(archive, class) else {
        return Vec::new();
    };
    verify_class(&parsed, class, index, &candidates.potential_bridges)
}

/// Call sites referencing a confirmed bridge directly mean the bridge is
/// not safely collapsible; reported, never auto-excluded.
fn scan_direct_references(
    archive: &Archive,
    class: &ClassEntry,
    bridges: &HashSet<&MemberRef>,
) -> usize {
    let Some(parsed) = read_class(archive, class) else {
        return 0;
    };

    let mut hits = 0;
    for method in &parsed.methods {
        let Some(code) = &method.code else {
            continue;
        };
        for insn in Instructions::new(&code.bytecode, &parsed.constant_pool) {
            match insn {
                Ok(Insn::Invoke { member, .. }) if bridges.contains(&member) => {
                    tracing::warn!(
                        bridge = %member,
                        caller = %class.internal_name,
                        caller_method = %method.name,
                        "direct reference to suspected bridge method"
                    );
                    hits += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        class = %class.internal_name,
                        method = %method.name,
                        error = %err,
                        "undecodable bytecode during reference scan"
                    );
                    break;
                }
            }
        }
    }
    hits
}

fn read_class(archive: &Archive, class: &ClassEntry) -> Option<ClassFile> {
    let bytes = match archive.read_class(&class.internal_name) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::warn!(class = %class.internal_name, "class missing from archive");
            return None;
        }
        Err(err) => {
            tracing::warn!(class = %class.internal_name, error = %err, "unable to read class");
            return None;
        }
    };
    match ClassFile::parse(&bytes) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(class = %class.internal_name, error = %err, "unable to parse class");
            None
        }
    }
}
