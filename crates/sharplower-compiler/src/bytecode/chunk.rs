//! Compiled code for one member body.

use std::fmt;

use super::OpCode;

/// Instruction bytes plus a parallel line table.
///
/// Constants live in the module-level `ConstantPool`, not here.
#[derive(Debug, Clone, Default)]
pub struct BytecodeChunk {
    code: Vec<u8>,
    /// One entry per byte of `code`.
    lines: Vec<u32>,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Big-endian.
    pub fn write_u16(&mut self, value: u16, line: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    /// Overwrite a previously written u16 operand.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
    }

    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// `(offset, opcode)` for every instruction, skipping operands.
    pub fn instructions(&self) -> Vec<(usize, OpCode)> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            match self.read_op(offset) {
                Some(op) => {
                    out.push((offset, op));
                    offset += 1 + op.operand_size();
                }
                None => offset += 1,
            }
        }
        out
    }

    /// The opcode sequence with operands stripped.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.instructions().into_iter().map(|(_, op)| op).collect()
    }

    pub fn count_op(&self, op: OpCode) -> usize {
        self.opcodes().iter().filter(|&&o| o == op).count()
    }

    /// Panics unless the chunk holds exactly `expected`, ignoring operands.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Panics unless `expected` appears in order (not necessarily contiguous).
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut expected_iter = expected.iter().peekable();

        for op in &actual {
            if expected_iter.peek() == Some(&op) {
                expected_iter.next();
            }
        }

        if expected_iter.peek().is_some() {
            let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
            panic!(
                "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
                remaining,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}

impl fmt::Display for BytecodeChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, op) in self.instructions() {
            write!(f, "{offset:04} {}", op.name())?;
            match op.operand_size() {
                1 => write!(f, " {}", self.read_byte(offset + 1).unwrap_or_default())?,
                2 => write!(f, " {}", self.read_u16(offset + 1).unwrap_or_default())?,
                3 => write!(
                    f,
                    " {} {}",
                    self.read_u16(offset + 1).unwrap_or_default(),
                    self.read_byte(offset + 3).unwrap_or_default()
                )?,
                _ => {}
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
