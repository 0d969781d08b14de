use crate::error::{Error, Result};
use crate::member::MemberRef;
use crate::reader::Reader;

#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle,
    MethodType { descriptor_index: u16 },
    Dynamic,
    InvokeDynamic,
    Module { name_index: u16 },
    Package { name_index: u16 },
    // Second slot of a Long or Double constant.
    Wide,
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Utf8(_) => "Utf8",
            Entry::Integer(_) => "Integer",
            Entry::Float(_) => "Float",
            Entry::Long(_) => "Long",
            Entry::Double(_) => "Double",
            Entry::Class { .. } => "Class",
            Entry::String { .. } => "String",
            Entry::FieldRef { .. } => "Fieldref",
            Entry::MethodRef { .. } => "Methodref",
            Entry::InterfaceMethodRef { .. } => "InterfaceMethodref",
            Entry::NameAndType { .. } => "NameAndType",
            Entry::MethodHandle => "MethodHandle",
            Entry::MethodType { .. } => "MethodType",
            Entry::Dynamic => "Dynamic",
            Entry::InvokeDynamic => "InvokeDynamic",
            Entry::Module { .. } => "Module",
            Entry::Package { .. } => "Package",
            Entry::Wide => "unusable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    // Index 0 is unusable; entries[0] is a placeholder so constant pool
    // indices can be used directly.
    entries: Vec<Entry>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Entry::Wide);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    Entry::Utf8(decode_modified_utf8(bytes)?)
                }
                3 => Entry::Integer(reader.read_u4()? as i32),
                4 => Entry::Float(f32::from_bits(reader.read_u4()?)),
                5 => {
                    let high = reader.read_u4()? as u64;
                    let low = reader.read_u4()? as u64;
                    Entry::Long(((high << 32) | low) as i64)
                }
                6 => {
                    let high = reader.read_u4()? as u64;
                    let low = reader.read_u4()? as u64;
                    Entry::Double(f64::from_bits((high << 32) | low))
                }
                7 => Entry::Class {
                    name_index: reader.read_u2()?,
                },
                8 => Entry::String {
                    string_index: reader.read_u2()?,
                },
                9 => Entry::FieldRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                10 => Entry::MethodRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                11 => Entry::InterfaceMethodRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                12 => Entry::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => {
                    reader.skip(3)?;
                    Entry::MethodHandle
                }
                16 => Entry::MethodType {
                    descriptor_index: reader.read_u2()?,
                },
                17 => {
                    reader.skip(4)?;
                    Entry::Dynamic
                }
                18 => {
                    reader.skip(4)?;
                    Entry::InvokeDynamic
                }
                19 => Entry::Module {
                    name_index: reader.read_u2()?,
                },
                20 => Entry::Package {
                    name_index: reader.read_u2()?,
                },
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };

            let wide = matches!(entry, Entry::Long(_) | Entry::Double(_));
            entries.push(entry);
            if wide {
                entries.push(Entry::Wide);
            }
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Entry> {
        self.entries
            .get(index as usize)
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Entry::Utf8(value) => Ok(value),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Entry::Class { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    /// Resolve a `Methodref` or `InterfaceMethodref` to its member triple.
    pub fn get_method_ref(&self, index: u16) -> Result<MemberRef> {
        let (class_index, name_and_type_index) = match self.get(index)? {
            Entry::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Entry::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            other => {
                return Err(Error::ConstantPoolTypeMismatch {
                    index,
                    expected: "Methodref",
                    found: other.kind(),
                })
            }
        };

        let owner = self.get_class_name(class_index)?;
        let (name_index, descriptor_index) = match self.get(name_and_type_index)? {
            Entry::NameAndType {
                name_index,
                descriptor_index,
            } => (*name_index, *descriptor_index),
            other => {
                return Err(Error::ConstantPoolTypeMismatch {
                    index: name_and_type_index,
                    expected: "NameAndType",
                    found: other.kind(),
                })
            }
        };

        Ok(MemberRef::new(
            owner,
            self.get_utf8(name_index)?,
            self.get_utf8(descriptor_index)?,
        ))
    }
}

/// Decode the JVM's modified UTF-8: no embedded NUL bytes, supplementary
/// characters as surrogate pairs of 3-byte groups.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let a = bytes[i];
        let unit = match a {
            0x01..=0x7f => {
                i += 1;
                a as u16
            }
            0xc0..=0xdf => {
                let b = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
                if b & 0xc0 != 0x80 {
                    return Err(Error::InvalidModifiedUtf8);
                }
                i += 2;
                ((a as u16 & 0x1f) << 6) | (b as u16 & 0x3f)
            }
            0xe0..=0xef => {
                let b = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
                let c = *bytes.get(i + 2).ok_or(Error::InvalidModifiedUtf8)?;
                if b & 0xc0 != 0x80 || c & 0xc0 != 0x80 {
                    return Err(Error::InvalidModifiedUtf8);
                }
                i += 3;
                ((a as u16 & 0x0f) << 12) | ((b as u16 & 0x3f) << 6) | (c as u16 & 0x3f)
            }
            _ => return Err(Error::InvalidModifiedUtf8),
        };
        units.push(unit);
    }

    for chunk in char::decode_utf16(units) {
        out.push(chunk.map_err(|_| Error::InvalidModifiedUtf8)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(body: &[u8], count: u16) -> ConstantPool {
        let mut bytes = count.to_be_bytes().to_vec();
        bytes.extend_from_slice(body);
        let mut reader = Reader::new(&bytes);
        ConstantPool::parse(&mut reader).unwrap()
    }

    #[test]
    fn utf8_and_class_resolution() {
        // 1: Utf8 "java/lang/Object", 2: Class -> 1
        let mut body = vec![1u8];
        let name = b"java/lang/Object";
        body.extend_from_slice(&(name.len() as u16).to_be_bytes());
        body.extend_from_slice(name);
        body.extend_from_slice(&[7, 0, 1]);

        let cp = pool(&body, 3);
        assert_eq!(cp.get_utf8(1).unwrap(), "java/lang/Object");
        assert_eq!(cp.get_class_name(2).unwrap(), "java/lang/Object");
    }

    #[test]
    fn long_occupies_two_slots() {
        // 1-2: Long, 3: Utf8 "x"
        let mut body = vec![5u8];
        body.extend_from_slice(&0x0102030405060708u64.to_be_bytes());
        body.extend_from_slice(&[1, 0, 1, b'x']);

        let cp = pool(&body, 4);
        assert_eq!(cp.get_utf8(3).unwrap(), "x");
        assert!(matches!(cp.get(1).unwrap(), Entry::Long(0x0102030405060708)));
        assert!(cp.get_utf8(2).is_err());
    }

    #[test]
    fn method_ref_resolution() {
        // 1: Utf8 "A", 2: Class -> 1, 3: Utf8 "get", 4: Utf8 "()Ljava/lang/Object;",
        // 5: NameAndType 3/4, 6: Methodref 2/5
        let mut body = Vec::new();
        body.extend_from_slice(&[1, 0, 1, b'A']);
        body.extend_from_slice(&[7, 0, 1]);
        body.extend_from_slice(&[1, 0, 3]);
        body.extend_from_slice(b"get");
        let desc = b"()Ljava/lang/Object;";
        body.push(1);
        body.extend_from_slice(&(desc.len() as u16).to_be_bytes());
        body.extend_from_slice(desc);
        body.extend_from_slice(&[12, 0, 3, 0, 4]);
        body.extend_from_slice(&[10, 0, 2, 0, 5]);

        let cp = pool(&body, 7);
        let member = cp.get_method_ref(6).unwrap();
        assert_eq!(member.owner, "A");
        assert_eq!(member.name, "get");
        assert_eq!(member.descriptor, "()Ljava/lang/Object;");
    }

    #[test]
    fn rejects_embedded_nul() {
        let body = [1u8, 0, 1, 0];
        let mut bytes = 2u16.to_be_bytes().to_vec();
        bytes.extend_from_slice(&body);
        let mut reader = Reader::new(&bytes);
        assert!(matches!(
            ConstantPool::parse(&mut reader),
            Err(Error::InvalidModifiedUtf8)
        ));
    }
}
