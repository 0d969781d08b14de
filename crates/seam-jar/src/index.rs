use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use seam_classfile::{is_interface, ClassFile};

use crate::archive::Archive;
use crate::error::JarError;

/// Hierarchy metadata for one class: names, flags, supertypes, and
/// declared members. No method bodies.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub internal_name: String,
    pub access_flags: u16,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

impl ClassEntry {
    pub fn from_classfile(class: &ClassFile) -> Self {
        Self {
            internal_name: class.this_class.clone(),
            access_flags: class.access_flags,
            super_class: class.super_class.clone(),
            interfaces: class.interfaces.clone(),
            methods: class
                .methods
                .iter()
                .map(|m| MethodEntry {
                    name: m.name.clone(),
                    descriptor: m.descriptor.clone(),
                    access_flags: m.access_flags,
                })
                .collect(),
        }
    }

    pub fn is_interface(&self) -> bool {
        is_interface(self.access_flags)
    }

    /// The method declared on this class with the given signature, if any.
    /// Inherited methods are not visible here.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodEntry> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        self.method(name, descriptor).is_some()
    }
}

/// All classes of one library, keyed by internal name.
#[derive(Debug, Default)]
pub struct ClassIndex {
    classes: HashMap<String, Arc<ClassEntry>>,
}

impl ClassIndex {
    /// Parse every class in the archive. Individually unreadable classes
    /// are logged and skipped; only archive-level failures are fatal.
    pub fn build(archive: &Archive) -> Result<Self, JarError> {
        let mut index = Self::default();
        for name in archive.class_names()? {
            let bytes = match archive.read_class(&name) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(class = %name, error = %err, "skipping unreadable class");
                    continue;
                }
            };
            match ClassFile::parse(&bytes) {
                Ok(class) => index.insert(ClassEntry::from_classfile(&class)),
                Err(err) => {
                    tracing::warn!(class = %name, error = %err, "skipping unparsable class");
                }
            }
        }
        Ok(index)
    }

    pub fn insert(&mut self, entry: ClassEntry) {
        self.classes
            .insert(entry.internal_name.clone(), Arc::new(entry));
    }

    pub fn get(&self, internal_name: &str) -> Option<&Arc<ClassEntry>> {
        self.classes.get(internal_name)
    }

    pub fn contains(&self, internal_name: &str) -> bool {
        self.classes.contains_key(internal_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClassEntry>> {
        self.classes.values()
    }

    /// The superclass entry, when it is part of this library.
    pub fn super_class_of(&self, entry: &ClassEntry) -> Option<&Arc<ClassEntry>> {
        self.get(entry.super_class.as_deref()?)
    }

    /// The transitive interface set of `entry`, breadth-first, restricted
    /// to interfaces present in this library.
    pub fn all_interfaces(&self, entry: &ClassEntry) -> Vec<Arc<ClassEntry>> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut queue: VecDeque<&str> = entry.interfaces.iter().map(String::as_str).collect();

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            if let Some(itf) = self.get(name) {
                out.push(itf.clone());
                for parent in &itf.interfaces {
                    queue.push_back(parent.as_str());
                }
            }
        }
        out
    }
}
