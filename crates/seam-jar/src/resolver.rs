use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use seam_classfile::ClassFile;

use crate::archive::Archive;
use crate::index::{ClassEntry, ClassIndex};

/// Ancestor lookup that falls back to *virtual* entries for classes
/// outside the library (platform classes, undeclared dependencies),
/// synthesized on demand from extra classpath archives.
///
/// Virtual entries carry only the class's own declared members; nothing
/// inherited is fabricated. The memo is scoped to one engine run.
pub struct VirtualResolver<'a> {
    index: &'a ClassIndex,
    sources: Vec<Archive>,
    cache: RwLock<HashMap<String, Option<Arc<ClassEntry>>>>,
}

impl<'a> VirtualResolver<'a> {
    pub fn new(index: &'a ClassIndex, sources: Vec<Archive>) -> Self {
        let mut cache = HashMap::new();
        // Hierarchy walks terminate at Object; synthesizing it would only
        // add a no-parent entry every walk already implies.
        cache.insert("java/lang/Object".to_string(), None);

        Self {
            index,
            sources,
            cache: RwLock::new(cache),
        }
    }

    /// The library's own entry, or a memoized virtual entry.
    ///
    /// Synthesis failure (class not on any source, or unreadable) is
    /// memoized as absent: the caller degrades to "no parent found".
    pub fn resolve(&self, internal_name: &str) -> Option<Arc<ClassEntry>> {
        if let Some(entry) = self.index.get(internal_name) {
            return Some(entry.clone());
        }

        if let Some(cached) = self.cache.read().get(internal_name) {
            return cached.clone();
        }

        let synthesized = self.synthesize(internal_name).map(Arc::new);

        let mut cache = self.cache.write();
        // Insert-if-absent: a racing synthesis of the same name keeps the
        // first fully-constructed entry.
        cache
            .entry(internal_name.to_string())
            .or_insert(synthesized)
            .clone()
    }

    fn synthesize(&self, internal_name: &str) -> Option<ClassEntry> {
        for source in &self.sources {
            let bytes = match source.read_class(internal_name) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        class = %internal_name,
                        source = %source.path().display(),
                        error = %err,
                        "unable to read virtual class"
                    );
                    continue;
                }
            };
            match ClassFile::parse(&bytes) {
                Ok(class) => return Some(ClassEntry::from_classfile(&class)),
                Err(err) => {
                    tracing::warn!(
                        class = %internal_name,
                        source = %source.path().display(),
                        error = %err,
                        "unable to create virtual class"
                    );
                    return None;
                }
            }
        }

        tracing::debug!(class = %internal_name, "no virtual source for class");
        None
    }
}
