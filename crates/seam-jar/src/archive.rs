use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::JarError;

/// A class library on disk: a jar or an exploded class directory.
#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

pub fn class_entry_name(internal_name: &str) -> String {
    format!("{internal_name}.class")
}

pub fn entry_to_internal_name(entry_name: &str) -> Option<&str> {
    if !entry_name.ends_with(".class") {
        return None;
    }

    entry_name
        .strip_prefix('/')
        .unwrap_or(entry_name)
        .strip_suffix(".class")
}

fn is_indexable_class(internal_name: &str) -> bool {
    // Multi-release copies would double-count classes, and descriptor-less
    // info classes carry no members worth indexing.
    !internal_name.starts_with("META-INF/")
        && internal_name != "module-info"
        && !internal_name.ends_with("/package-info")
        && internal_name != "package-info"
}

impl Archive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a class's bytes by internal name.
    ///
    /// Returns `Ok(None)` when the class isn't present.
    pub fn read_class(&self, internal_name: &str) -> Result<Option<Vec<u8>>, JarError> {
        let entry_name = class_entry_name(internal_name);

        if self.path.is_dir() {
            let candidate = self.path.join(&entry_name);
            if !candidate.is_file() {
                return Ok(None);
            }
            let mut buf = Vec::new();
            File::open(&candidate)?.read_to_end(&mut buf)?;
            return Ok(Some(buf));
        }

        let file = File::open(&self.path)?;
        let mut zip = ZipArchive::new(file)?;
        let result = match zip.by_name(&entry_name) {
            Ok(mut entry) => {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(err) => Err(err.into()),
        };
        result
    }

    /// Enumerate the internal names of every indexable class in the
    /// library, in archive order.
    pub fn class_names(&self) -> Result<Vec<String>, JarError> {
        if self.path.is_dir() {
            return self.dir_class_names();
        }
        if !self.path.is_file() {
            return Err(JarError::UnsupportedLibrary(self.path.clone()));
        }

        let file = File::open(&self.path)?;
        let zip = ZipArchive::new(file)?;
        let mut names = Vec::new();
        for entry_name in zip.file_names() {
            if let Some(internal) = entry_to_internal_name(entry_name) {
                if is_indexable_class(internal) {
                    names.push(internal.to_string());
                }
            }
        }
        Ok(names)
    }

    fn dir_class_names(&self) -> Result<Vec<String>, JarError> {
        let mut names = Vec::new();
        for entry in walkdir::WalkDir::new(&self.path)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.path) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if let Some(internal) = entry_to_internal_name(&rel) {
                if is_indexable_class(internal) {
                    names.push(internal.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
