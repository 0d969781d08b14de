#![forbid(unsafe_code)]

mod access;
mod classfile;
mod constant_pool;
mod descriptor;
mod error;
mod insn;
mod member;
mod reader;

pub use crate::access::{
    is_bridge, is_final, is_interface, is_private_or_static, is_static, is_synthetic,
    visibility_bits, ACC_ABSTRACT, ACC_BRIDGE, ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE,
    ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC,
};
pub use crate::classfile::{ClassFile, ClassMember, Code};
pub use crate::constant_pool::ConstantPool;
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
pub use crate::insn::{Insn, Instructions, InvokeKind};
pub use crate::member::MemberRef;
