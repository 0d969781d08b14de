//! Archive access and hierarchy indexing for a compiled class library.
//!
//! A library is either a jar or an exploded class directory. The index
//! stores hierarchy metadata only (names, flags, supertypes, declared
//! members); method bodies are re-read from the archive by the stages
//! that need them.

#![forbid(unsafe_code)]

mod archive;
mod error;
mod index;
mod resolver;

pub use crate::archive::Archive;
pub use crate::error::JarError;
pub use crate::index::{ClassEntry, ClassIndex, MethodEntry};
pub use crate::resolver::VirtualResolver;
