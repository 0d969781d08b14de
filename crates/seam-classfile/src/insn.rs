//! Single-pass categorized walk over a method's bytecode.
//!
//! The walk surfaces only the instruction shapes delegation verification
//! dispatches on: argument loads, stores, returns, member invokes, and
//! type checks. Every other instruction is bucketed as [`Insn::Other`].

use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::member::MemberRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// A local-variable load (`iload` family, including short forms and
    /// `wide` prefixes).
    Load { slot: u16 },
    /// A local-variable store.
    Store,
    /// Any of the six return opcodes.
    Return,
    /// `invokevirtual`/`invokespecial`/`invokestatic`/`invokeinterface`
    /// with its resolved callee triple.
    Invoke { kind: InvokeKind, member: MemberRef },
    /// `checkcast` (`cast` true) or another type instruction
    /// (`new`/`anewarray`/`instanceof`).
    Type { cast: bool },
    /// Everything else: constants, field access, arithmetic, jumps,
    /// switches, `invokedynamic`, monitors, ...
    Other,
}

pub struct Instructions<'a> {
    code: &'a [u8],
    pool: &'a ConstantPool,
    offset: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(code: &'a [u8], pool: &'a ConstantPool) -> Self {
        Self {
            code,
            pool,
            offset: 0,
            failed: false,
        }
    }

    fn operand_u8(&self, at: usize) -> Result<u8> {
        self.code.get(at).copied().ok_or(Error::TruncatedInstruction {
            opcode: self.code[self.offset],
            offset: self.offset,
        })
    }

    fn operand_u16(&self, at: usize) -> Result<u16> {
        let slice =
            self.code
                .get(at..at + 2)
                .ok_or(Error::TruncatedInstruction {
                    opcode: self.code[self.offset],
                    offset: self.offset,
                })?;
        Ok(u16::from_be_bytes([slice[0], slice[1]]))
    }

    fn operand_i32(&self, at: usize) -> Result<i32> {
        let slice =
            self.code
                .get(at..at + 4)
                .ok_or(Error::TruncatedInstruction {
                    opcode: self.code[self.offset],
                    offset: self.offset,
                })?;
        Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    fn step(&mut self) -> Result<Insn> {
        let offset = self.offset;
        let opcode = self.code[offset];

        let (insn, length) = match opcode {
            // nop, constants
            0x00..=0x0f => (Insn::Other, 1),
            // bipush, sipush
            0x10 => (Insn::Other, 2),
            0x11 => (Insn::Other, 3),
            // ldc, ldc_w, ldc2_w
            0x12 => (Insn::Other, 2),
            0x13 | 0x14 => (Insn::Other, 3),
            // iload..aload with operand
            0x15..=0x19 => (
                Insn::Load {
                    slot: self.operand_u8(offset + 1)? as u16,
                },
                2,
            ),
            // iload_0..aload_3
            0x1a..=0x2d => (
                Insn::Load {
                    slot: ((opcode - 0x1a) % 4) as u16,
                },
                1,
            ),
            // array loads
            0x2e..=0x35 => (Insn::Other, 1),
            // istore..astore with operand
            0x36..=0x3a => (Insn::Store, 2),
            // istore_0..astore_3
            0x3b..=0x4e => (Insn::Store, 1),
            // array stores, stack ops, arithmetic
            0x4f..=0x83 => (Insn::Other, 1),
            // iinc
            0x84 => (Insn::Other, 3),
            // conversions, comparisons
            0x85..=0x98 => (Insn::Other, 1),
            // conditional branches, goto, jsr
            0x99..=0xa8 => (Insn::Other, 3),
            // ret
            0xa9 => (Insn::Other, 2),
            0xaa => (Insn::Other, self.tableswitch_length(offset)?),
            0xab => (Insn::Other, self.lookupswitch_length(offset)?),
            // ireturn..return
            0xac..=0xb1 => (Insn::Return, 1),
            // getstatic, putstatic, getfield, putfield
            0xb2..=0xb5 => (Insn::Other, 3),
            0xb6..=0xb8 => {
                let kind = match opcode {
                    0xb6 => InvokeKind::Virtual,
                    0xb7 => InvokeKind::Special,
                    _ => InvokeKind::Static,
                };
                let member = self.pool.get_method_ref(self.operand_u16(offset + 1)?)?;
                (Insn::Invoke { kind, member }, 3)
            }
            0xb9 => {
                let member = self.pool.get_method_ref(self.operand_u16(offset + 1)?)?;
                (
                    Insn::Invoke {
                        kind: InvokeKind::Interface,
                        member,
                    },
                    5,
                )
            }
            // invokedynamic
            0xba => (Insn::Other, 5),
            // new
            0xbb => (Insn::Type { cast: false }, 3),
            // newarray
            0xbc => (Insn::Other, 2),
            // anewarray
            0xbd => (Insn::Type { cast: false }, 3),
            // arraylength, athrow
            0xbe | 0xbf => (Insn::Other, 1),
            // checkcast
            0xc0 => (Insn::Type { cast: true }, 3),
            // instanceof
            0xc1 => (Insn::Type { cast: false }, 3),
            // monitorenter, monitorexit
            0xc2 | 0xc3 => (Insn::Other, 1),
            0xc4 => self.wide(offset)?,
            // multianewarray
            0xc5 => (Insn::Other, 4),
            // ifnull, ifnonnull
            0xc6 | 0xc7 => (Insn::Other, 3),
            // goto_w, jsr_w
            0xc8 | 0xc9 => (Insn::Other, 5),
            other => return Err(Error::InvalidOpcode(other)),
        };

        let next = offset.checked_add(length).ok_or(Error::TruncatedInstruction {
            opcode,
            offset,
        })?;
        if next > self.code.len() {
            return Err(Error::TruncatedInstruction { opcode, offset });
        }
        self.offset = next;
        Ok(insn)
    }

    fn wide(&self, offset: usize) -> Result<(Insn, usize)> {
        let sub = self.operand_u8(offset + 1)?;
        match sub {
            // wide loads
            0x15..=0x19 => Ok((
                Insn::Load {
                    slot: self.operand_u16(offset + 2)?,
                },
                4,
            )),
            // wide stores, wide ret
            0x36..=0x3a | 0xa9 => Ok((Insn::Store, 4)),
            // wide iinc
            0x84 => Ok((Insn::Other, 6)),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    fn tableswitch_length(&self, offset: usize) -> Result<usize> {
        let base = offset + 1 + switch_padding(offset);
        let low = self.operand_i32(base + 4)?;
        let high = self.operand_i32(base + 8)?;
        let count = high
            .checked_sub(low)
            .and_then(|v| v.checked_add(1))
            .filter(|v| *v >= 0)
            .ok_or(Error::TruncatedInstruction {
                opcode: 0xaa,
                offset,
            })?;
        Ok(base - offset + 12 + count as usize * 4)
    }

    fn lookupswitch_length(&self, offset: usize) -> Result<usize> {
        let base = offset + 1 + switch_padding(offset);
        let npairs = self.operand_i32(base + 4)?;
        if npairs < 0 {
            return Err(Error::TruncatedInstruction {
                opcode: 0xab,
                offset,
            });
        }
        Ok(base - offset + 8 + npairs as usize * 8)
    }
}

/// Switch payloads are aligned to a four-byte boundary from the start of
/// the code array.
fn switch_padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

impl Iterator for Instructions<'_> {
    type Item = Result<Insn>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.code.len() {
            return None;
        }
        match self.step() {
            Ok(insn) => Some(Ok(insn)),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
