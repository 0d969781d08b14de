use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use seam_classfile::{
    parse_field_descriptor, parse_method_descriptor, BaseType, FieldType, MemberRef, ReturnType,
};

use crate::error::MappingError;

/// One parsed mapping file, in original line order.
#[derive(Debug)]
pub struct TinyFile {
    header: String,
    namespaces: Vec<String>,
    lines: Vec<Line>,
    // Native class name -> index of its CLASS line, for remapping owners
    // and descriptors into other namespaces.
    class_lines: HashMap<String, usize>,
}

#[derive(Debug)]
pub enum Line {
    /// Anything that isn't a member line; copied verbatim.
    Context(String),
    Class(ClassLine),
    Field(MemberLine),
    Method(MemberLine),
}

#[derive(Debug)]
pub struct ClassLine {
    raw: String,
    names: Vec<Option<String>>,
}

#[derive(Debug)]
pub struct MemberLine {
    raw: String,
    native: MemberRef,
    names: Vec<Option<String>>,
}

impl Line {
    pub fn raw(&self) -> &str {
        match self {
            Line::Context(raw) => raw,
            Line::Class(line) => &line.raw,
            Line::Field(line) | Line::Method(line) => &line.raw,
        }
    }
}

impl ClassLine {
    pub fn name(&self, namespace_id: usize) -> Option<&str> {
        self.names.get(namespace_id)?.as_deref()
    }

    /// The primary-namespace name; always present.
    pub fn native_name(&self) -> &str {
        self.names[0].as_deref().unwrap_or_default()
    }
}

impl MemberLine {
    pub fn name(&self, namespace_id: usize) -> Option<&str> {
        self.names.get(namespace_id)?.as_deref()
    }

    /// The member's identity in the primary namespace.
    pub fn native(&self) -> &MemberRef {
        &self.native
    }
}

impl TinyFile {
    pub fn read(path: &Path) -> Result<Self, MappingError> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    pub fn parse(reader: impl BufRead) -> Result<Self, MappingError> {
        let mut lines_in = reader.lines();
        let header = lines_in
            .next()
            .transpose()?
            .ok_or_else(|| MappingError::InvalidHeader(String::new()))?;

        let fields: Vec<&str> = header.split('\t').collect();
        if fields.len() <= 1 || fields[0] != "v1" {
            return Err(MappingError::InvalidHeader(header.clone()));
        }

        let namespaces: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
        let mut seen = HashMap::new();
        for (id, namespace) in namespaces.iter().enumerate() {
            if seen.insert(namespace.as_str(), id).is_some() {
                return Err(MappingError::DuplicateNamespace(namespace.clone()));
            }
        }

        let mut lines = Vec::new();
        let mut class_lines = HashMap::new();
        for (i, raw) in lines_in.enumerate() {
            let raw = raw?;
            // Header is line 1.
            let line_no = i + 2;
            let data: Vec<&str> = raw.split('\t').collect();

            let line = if data.len() >= 2 {
                match data[0] {
                    "CLASS" => {
                        let names = collect_names(&data[1..], namespaces.len());
                        let Some(native) = names[0].clone() else {
                            return Err(MappingError::MissingPrimaryName { line: line_no });
                        };
                        class_lines.insert(native, lines.len());
                        Line::Class(ClassLine { raw, names })
                    }
                    tag @ ("FIELD" | "METHOD") => {
                        let is_field = tag == "FIELD";
                        let names = collect_names(data.get(3..).unwrap_or_default(), namespaces.len());
                        let (Some(owner), Some(descriptor), Some(name)) =
                            (data.get(1), data.get(2), names[0].as_deref())
                        else {
                            return Err(MappingError::MissingPrimaryName { line: line_no });
                        };
                        let member = MemberLine {
                            native: MemberRef::new(*owner, name, *descriptor),
                            raw,
                            names,
                        };
                        if is_field {
                            Line::Field(member)
                        } else {
                            Line::Method(member)
                        }
                    }
                    _ => Line::Context(raw),
                }
            } else {
                Line::Context(raw)
            };
            lines.push(line);
        }

        Ok(Self {
            header,
            namespaces,
            lines,
            class_lines,
        })
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// The first declared namespace: the one owners and descriptors are
    /// expressed in.
    pub fn primary_namespace(&self) -> &str {
        &self.namespaces[0]
    }

    pub fn namespace_id(&self, namespace: &str) -> Option<usize> {
        self.namespaces.iter().position(|n| n == namespace)
    }

    pub fn require_namespace(&self, namespace: &str) -> Result<usize, MappingError> {
        self.namespace_id(namespace)
            .ok_or_else(|| MappingError::UnknownNamespace(namespace.to_string()))
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// A class's name in the given namespace, falling back to the native
    /// name when the class is unmapped or the column is a hole.
    pub fn class_name_in<'a>(&'a self, native_name: &'a str, namespace_id: usize) -> &'a str {
        self.class_lines
            .get(native_name)
            .and_then(|&i| match &self.lines[i] {
                Line::Class(line) => line.name(namespace_id),
                _ => None,
            })
            .unwrap_or(native_name)
    }

    /// A member line's full identity in the given namespace: owner and
    /// descriptor remapped through the file's class lines, name from that
    /// namespace's column. `None` when the name is a hole.
    pub fn member_in(&self, line: &MemberLine, namespace_id: usize) -> Option<MemberRef> {
        if namespace_id == 0 {
            return Some(line.native.clone());
        }

        let name = line.name(namespace_id)?;
        Some(MemberRef::new(
            self.class_name_in(&line.native.owner, namespace_id),
            name,
            self.remap_descriptor(&line.native.descriptor, namespace_id),
        ))
    }

    fn remap_descriptor(&self, descriptor: &str, namespace_id: usize) -> String {
        if descriptor.starts_with('(') {
            let Ok(desc) = parse_method_descriptor(descriptor) else {
                return descriptor.to_string();
            };
            let mut out = String::from("(");
            for param in &desc.params {
                self.push_field_type(param, namespace_id, &mut out);
            }
            out.push(')');
            match &desc.return_type {
                ReturnType::Void => out.push('V'),
                ReturnType::Type(ty) => self.push_field_type(ty, namespace_id, &mut out),
            }
            out
        } else {
            let Ok(ty) = parse_field_descriptor(descriptor) else {
                return descriptor.to_string();
            };
            let mut out = String::new();
            self.push_field_type(&ty, namespace_id, &mut out);
            out
        }
    }

    fn push_field_type(&self, ty: &FieldType, namespace_id: usize, out: &mut String) {
        match ty {
            FieldType::Base(base) => out.push(base_char(*base)),
            FieldType::Object(name) => {
                out.push('L');
                out.push_str(self.class_name_in(name, namespace_id));
                out.push(';');
            }
            FieldType::Array(component) => {
                out.push('[');
                self.push_field_type(component, namespace_id, out);
            }
        }
    }
}

fn collect_names(columns: &[&str], namespace_count: usize) -> Vec<Option<String>> {
    let mut names = vec![None; namespace_count];
    for (i, column) in columns.iter().take(namespace_count).enumerate() {
        if !column.is_empty() {
            names[i] = Some((*column).to_string());
        }
    }
    names
}

fn base_char(base: BaseType) -> char {
    match base {
        BaseType::Byte => 'B',
        BaseType::Char => 'C',
        BaseType::Double => 'D',
        BaseType::Float => 'F',
        BaseType::Int => 'I',
        BaseType::Long => 'J',
        BaseType::Short => 'S',
        BaseType::Boolean => 'Z',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "v1\tofficial\tintermediary\tnamed\n\
        CLASS\ta\tclass_1\tFoo\n\
        METHOD\ta\t()La;\tb\tmethod_2\tgetSelf\n\
        FIELD\ta\tI\tc\tfield_3\tcount\n\
        # a comment line\n\
        METHOD\ta\t(J)V\td\tmethod_4\t\n";

    fn sample() -> TinyFile {
        TinyFile::parse(Cursor::new(SAMPLE)).unwrap()
    }

    #[test]
    fn parses_header_and_namespaces() {
        let file = sample();
        assert_eq!(file.namespaces(), ["official", "intermediary", "named"]);
        assert_eq!(file.primary_namespace(), "official");
        assert_eq!(file.namespace_id("named"), Some(2));
        assert!(file.require_namespace("missing").is_err());
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(
            TinyFile::parse(Cursor::new("v2\ta\tb\n")),
            Err(MappingError::InvalidHeader(_))
        ));
        assert!(matches!(
            TinyFile::parse(Cursor::new("v1\n")),
            Err(MappingError::InvalidHeader(_))
        ));
        assert!(matches!(
            TinyFile::parse(Cursor::new("v1\ta\ta\n")),
            Err(MappingError::DuplicateNamespace(_))
        ));
    }

    #[test]
    fn member_lines_carry_native_triples() {
        let file = sample();
        let Line::Method(line) = &file.lines()[1] else {
            panic!("expected METHOD line");
        };
        assert_eq!(line.native(), &MemberRef::new("a", "b", "()La;"));
        assert_eq!(line.name(2), Some("getSelf"));
    }

    #[test]
    fn remaps_owner_and_descriptor_into_other_namespaces() {
        let file = sample();
        let Line::Method(line) = &file.lines()[1] else {
            panic!("expected METHOD line");
        };
        let named = file.member_in(line, 2).unwrap();
        assert_eq!(named, MemberRef::new("Foo", "getSelf", "()LFoo;"));
    }

    #[test]
    fn holes_yield_no_identity() {
        let file = sample();
        let Line::Method(line) = &file.lines()[4] else {
            panic!("expected METHOD line");
        };
        assert_eq!(line.name(2), None);
        assert!(file.member_in(line, 2).is_none());
        // Primitive-only descriptors survive remapping untouched.
        assert_eq!(
            file.member_in(line, 1).unwrap(),
            MemberRef::new("class_1", "method_4", "(J)V")
        );
    }

    #[test]
    fn context_lines_round_trip() {
        let file = sample();
        assert!(matches!(&file.lines()[3], Line::Context(raw) if raw == "# a comment line"));
    }

    #[test]
    fn missing_primary_name_is_fatal() {
        let text = "v1\ta\tb\nMETHOD\towner\t()V\t\tonly_secondary\n";
        assert!(matches!(
            TinyFile::parse(Cursor::new(text)),
            Err(MappingError::MissingPrimaryName { line: 2 })
        ));
    }
}
