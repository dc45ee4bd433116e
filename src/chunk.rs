use num_derive::FromPrimitive;

use crate::value::Value;

/// A single bytecode instruction. One byte on the wire; some carry a
/// one-byte constant-pool operand that follows immediately in `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    Constant,
    Nil,
    True,
    False,
    Pop,
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    Negate,
    Print,
    Return,
}

/// A chunk of bytecode: a flat byte array, a parallel per-byte line-number
/// array for error reporting, and a one-byte-indexed constant pool.
#[derive(Debug, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<usize>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Appends one raw byte, recording the source line it came from.
    pub fn write(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write(op as u8, line);
    }

    pub fn get_op(&self, offset: usize) -> OpCode {
        num_traits::FromPrimitive::from_u8(self.code[offset])
            .unwrap_or_else(|| panic!("corrupt bytecode: unknown opcode {}", self.code[offset]))
    }

    pub fn get_byte(&self, offset: usize) -> u8 {
        self.code[offset]
    }

    pub fn get_line(&self, offset: usize) -> usize {
        self.lines[offset]
    }

    pub fn get_constant(&self, index: u8) -> &Value {
        &self.constants[index as usize]
    }

    /// Appends `value` to the constant pool, returning its index.
    /// Errors with `()` if the pool is already at its 256-entry capacity
    /// (the compiler turns this into the "Too many constants" diagnostic).
    pub fn add_constant(&mut self, value: Value) -> Result<u8, ()> {
        if self.constants.len() >= 256 {
            return Err(());
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u8)
    }
}

#[cfg(feature = "trace")]
pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {} ==", name);
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset);
    }
}

#[cfg(feature = "trace")]
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    print!("{:04} ", offset);
    if offset > 0 && chunk.get_line(offset) == chunk.get_line(offset - 1) {
        print!("   | ");
    } else {
        print!("{:4} ", chunk.get_line(offset));
    }

    let op = chunk.get_op(offset);
    match op {
        OpCode::Constant => {
            let idx = chunk.get_byte(offset + 1);
            println!("{:<16} {:4} '{}'", "OP_CONSTANT", idx, chunk.get_constant(idx));
            offset + 2
        }
        _ => {
            println!("{:?}", op);
            offset + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_lines_stay_parallel() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Return, 1);
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.get_line(0), 1);
    }

    #[test]
    fn constant_pool_rejects_a_257th_entry() {
        let mut chunk = Chunk::new();
        for _ in 0..256 {
            assert!(chunk.add_constant(Value::Number(0.0)).is_ok());
        }
        assert_eq!(chunk.add_constant(Value::Number(0.0)), Err(()));
    }
}
