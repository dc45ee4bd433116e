mod run;

use std::io::{self, Write};

use log::debug;

use crate::chunk::Chunk;
use crate::compiler::Compiler;
use crate::table::Table;
use crate::value::Value;

const STACK_MAX: usize = 256;

/// Outcome of a full `interpret()` call: the public contract the CLI
/// driver maps to exit codes 0/65/70.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// Internal result of running one chunk to completion, distinct from
/// `InterpretResult` because `run()` also needs to fold "ended via
/// RETURN" into `Ok` without knowing whether compilation happened.
enum RuntimeResult {
    Ok,
    Error,
}

/// Owns a chunk, the instruction pointer, the fixed-capacity value
/// stack, and the process-wide string intern table. An ordinary owned
/// value, not a singleton, so tests can run multiple VMs independently.
pub struct Vm {
    chunk: Chunk,
    ip: usize,
    stack: Vec<Value>,
    strings: Table,
    output: Box<dyn Write>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm::with_output(io::stdout())
    }

    /// Builds a `Vm` that writes `print` output to `output` instead of
    /// stdout, so callers (tests, embedders) can capture it.
    pub fn with_output<W: Write + 'static>(output: W) -> Self {
        Vm {
            chunk: Chunk::new(),
            ip: 0,
            stack: Vec::with_capacity(STACK_MAX),
            strings: Table::new(),
            output: Box::new(output),
        }
    }

    /// Compiles and runs `source`, end to end.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let chunk = match Compiler::compile(source, &mut self.strings) {
            Ok(chunk) => chunk,
            Err(()) => return InterpretResult::CompileError,
        };

        self.chunk = chunk;
        self.ip = 0;
        self.stack.clear();

        #[cfg(feature = "trace")]
        crate::chunk::disassemble_chunk(&self.chunk, "script");

        debug!("running chunk ({} bytes)", self.chunk.len());

        match self.run() {
            RuntimeResult::Ok => InterpretResult::Ok,
            RuntimeResult::Error => InterpretResult::RuntimeError,
        }
    }

    // --- stack helpers ------------------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), String> {
        if self.stack.len() >= STACK_MAX {
            return Err("Stack overflow.".to_string());
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("compiler guarantees balanced push/pop")
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    // --- bytecode cursor ------------------------------------------------------

    fn read_byte(&mut self) -> u8 {
        let byte = self.chunk.get_byte(self.ip);
        self.ip += 1;
        byte
    }

    fn read_op(&mut self) -> crate::chunk::OpCode {
        let op = self.chunk.get_op(self.ip);
        self.ip += 1;
        op
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte();
        self.chunk.get_constant(index).clone()
    }

    /// Prints the runtime error, the faulting source line, resets the
    /// stack, and logs the same message at `error` level.
    fn runtime_error(&mut self, message: &str) {
        let faulting_line = self.chunk.get_line(self.ip - 1);
        eprintln!("{}", message);
        eprintln!("[line {}] in script", faulting_line);
        log::error!("runtime error at line {}: {}", faulting_line, message);
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_and_capture(src: &str) -> (InterpretResult, Vec<Value>) {
        let mut vm = Vm::new();
        let result = vm.interpret(src);
        (result, vm.stack.clone())
    }

    #[test]
    fn empty_program_runs_ok_with_no_output() {
        let (result, _) = run_and_capture("");
        assert_eq!(result, InterpretResult::Ok);
    }

    #[test]
    fn compile_error_is_reported_as_such() {
        let (result, _) = run_and_capture("print 1 +;");
        assert_eq!(result, InterpretResult::CompileError);
    }

    #[test]
    fn runtime_type_error_resets_the_stack() {
        let mut vm = Vm::new();
        let result = vm.interpret("-true;");
        assert_eq!(result, InterpretResult::RuntimeError);
        assert!(vm.stack.is_empty());
    }

    #[test]
    fn independent_vms_do_not_share_state() {
        let mut a = Vm::new();
        let mut b = Vm::new();
        assert_eq!(a.interpret("print 1;"), InterpretResult::Ok);
        assert_eq!(b.interpret("print 2;"), InterpretResult::Ok);
    }
}
