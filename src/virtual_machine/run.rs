use std::io::Write;

use crate::chunk::OpCode;
use crate::value::Value;
use crate::virtual_machine::{RuntimeResult, Vm};

impl Vm {
    /// The fetch-decode-execute loop. Runs until `RETURN` or a runtime
    /// error; `self.ip` always points at the single instruction being
    /// executed, post-increment, the way `READ_BYTE` works in the
    /// reference implementation.
    pub(crate) fn run(&mut self) -> RuntimeResult {
        loop {
            #[cfg(feature = "trace")]
            {
                print!("          ");
                for value in &self.stack {
                    print!("[ {} ]", value);
                }
                println!();
                crate::chunk::disassemble_instruction(&self.chunk, self.ip);
            }

            let instruction = self.read_op();

            match instruction {
                OpCode::Constant => {
                    let constant = self.read_constant();
                    if self.push(constant).is_err() {
                        self.runtime_error("Stack overflow.");
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Nil => {
                    let _ = self.push(Value::Nil);
                }
                OpCode::True => {
                    let _ = self.push(Value::Bool(true));
                }
                OpCode::False => {
                    let _ = self.push(Value::Bool(false));
                }
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    let _ = self.push(Value::Bool(a == b));
                }
                OpCode::Greater => {
                    if let Err(msg) = self.numeric_comparison(|a, b| a > b) {
                        self.runtime_error(&msg);
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Less => {
                    if let Err(msg) = self.numeric_comparison(|a, b| a < b) {
                        self.runtime_error(&msg);
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Add => {
                    if let Err(msg) = self.op_add() {
                        self.runtime_error(&msg);
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Subtract => {
                    if let Err(msg) = self.numeric_binary(|a, b| a - b) {
                        self.runtime_error(&msg);
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Multiply => {
                    if let Err(msg) = self.numeric_binary(|a, b| a * b) {
                        self.runtime_error(&msg);
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Divide => {
                    if let Err(msg) = self.numeric_binary(|a, b| a / b) {
                        self.runtime_error(&msg);
                        return RuntimeResult::Error;
                    }
                }
                OpCode::Not => {
                    let v = self.pop();
                    let _ = self.push(Value::Bool(v.is_falsey()));
                }
                OpCode::Negate => {
                    if !self.peek(0).is_number() {
                        self.runtime_error("Operand must be a number.");
                        return RuntimeResult::Error;
                    }
                    let v = self.pop();
                    if let Value::Number(n) = v {
                        let _ = self.push(Value::Number(-n));
                    }
                }
                OpCode::Print => {
                    let v = self.pop();
                    let _ = writeln!(self.output, "{}", v);
                }
                OpCode::Return => return RuntimeResult::Ok,
            }
        }
    }

    fn numeric_binary(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), String> {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            return Err("Operands must be numbers.".to_string());
        }
        let b = self.pop();
        let a = self.pop();
        if let (Value::Number(a), Value::Number(b)) = (a, b) {
            let _ = self.push(Value::Number(op(a, b)));
        }
        Ok(())
    }

    fn numeric_comparison(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), String> {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            return Err("Operands must be numbers.".to_string());
        }
        let b = self.pop();
        let a = self.pop();
        if let (Value::Number(a), Value::Number(b)) = (a, b) {
            let _ = self.push(Value::Bool(op(a, b)));
        }
        Ok(())
    }

    /// `ADD` is the one overloaded operator: number+number or
    /// string+string. The reference implementation's VM case actually
    /// tests `IS_STRING(peek(0)) && IS_NUMBER(peek(1))` here, which is a
    /// bug (almost certainly meant `IS_STRING && IS_STRING`); this checks
    /// both operands are strings before concatenating.
    fn op_add(&mut self) -> Result<(), String> {
        let both_numbers = self.peek(0).is_number() && self.peek(1).is_number();
        let both_strings = self.peek(0).is_string() && self.peek(1).is_string();

        if !both_numbers && !both_strings {
            return Err("Operands must be two numbers or two strings.".to_string());
        }

        let b = self.pop();
        let a = self.pop();

        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                let _ = self.push(Value::Number(a + b));
            }
            (Value::Obj(a), Value::Obj(b)) => {
                let concatenated = format!("{}{}", a.chars, b.chars);
                let interned = self.strings.intern(concatenated);
                let _ = self.push(Value::Obj(interned));
            }
            _ => unreachable!("both_numbers/both_strings already ruled out mixed operands"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use crate::virtual_machine::{InterpretResult, Vm};

    fn run(src: &str) -> InterpretResult {
        Vm::new().interpret(src)
    }

    /// An in-memory sink cloneable via `Rc` so the test can both hand it
    /// to the `Vm` and read back what was written afterward.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.0.borrow_mut().flush()
        }
    }

    /// Runs `src` against a `Vm` writing to an in-memory buffer and
    /// returns both the result and what it printed, so precedence and
    /// formatting regressions show up as a text mismatch, not just a
    /// matching `InterpretResult`.
    fn run_capturing(src: &str) -> (InterpretResult, String) {
        let buf = SharedBuf::default();
        let result = Vm::with_output(buf.clone()).interpret(src);
        let bytes = buf.0.borrow().clone();
        (result, String::from_utf8(bytes).expect("print output is always valid UTF-8"))
    }

    #[test]
    fn arithmetic_follows_precedence() {
        let (result, output) = run_capturing("print 1 + 2 * 3;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "7\n");
    }

    #[test]
    fn parentheses_override_precedence() {
        let (result, output) = run_capturing("print (1 + 2) * 3;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "9\n");
    }

    #[test]
    fn string_concatenation_requires_both_operands_to_be_strings() {
        assert_eq!(run(r#"print 1 + "a";"#), InterpretResult::RuntimeError);
        assert_eq!(run(r#"print "a" + 1;"#), InterpretResult::RuntimeError);

        let (result, output) = run_capturing(r#"print "ab" + "cd";"#);
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "abcd\n");
    }

    #[test]
    fn negate_requires_a_number() {
        assert_eq!(run("-true;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn equality_never_runtime_errors_across_tags() {
        assert_eq!(run("print 1 == \"1\";"), InterpretResult::Ok);
        assert_eq!(run("print nil == false;"), InterpretResult::Ok);
    }

    #[test]
    fn division_by_zero_yields_infinity_not_an_error() {
        assert_eq!(run("print 1 / 0;"), InterpretResult::Ok);
    }
}
