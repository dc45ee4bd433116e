mod precedence;

use log::debug;

use crate::chunk::{Chunk, OpCode};
use crate::scanner::{Scanner, Token, TokenType};
use crate::table::Table;
use crate::value::Value;
use precedence::{get_rule, ParseFn, Precedence};

/// Single-pass source-to-bytecode compiler: a Pratt parser that emits
/// directly into a `Chunk`, never building an intermediate tree.
///
/// Holds the scanner and the "current"/"previous" token pair that every
/// parse action reads from, plus panic-mode bookkeeping for error
/// recovery. This is an explicit, ordinarily-owned value rather than a
/// process singleton, so independent compilations never interfere.
pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    current: Token<'a>,
    previous: Token<'a>,
    had_error: bool,
    panic_mode: bool,
    chunk: Chunk,
    strings: &'a mut Table,
}

impl<'a> Compiler<'a> {
    /// Compiles `source` into a fresh `Chunk`. On success the chunk ends
    /// with `RETURN`. On failure, diagnostics have already been printed
    /// to stderr and `Err(())` is returned; the partially-emitted chunk is
    /// simply dropped.
    ///
    /// `strings` is the intern table the VM will later execute against;
    /// string literals are interned into it at compile time so that a
    /// literal and a runtime-concatenated string with the same content
    /// are the same object.
    pub fn compile(source: &'a str, strings: &'a mut Table) -> Result<Chunk, ()> {
        let mut scanner = Scanner::new(source);
        let first = scanner.scan_token();

        let mut compiler = Compiler {
            scanner,
            current: first,
            previous: first,
            had_error: false,
            panic_mode: false,
            chunk: Chunk::new(),
            strings,
        };

        while !compiler.check(TokenType::Eof) {
            compiler.declaration();
        }

        compiler.emit_op(OpCode::Return);

        if compiler.had_error {
            Err(())
        } else {
            debug!("compiled {} bytes of bytecode", compiler.chunk.len());
            Ok(compiler.chunk)
        }
    }

    // --- token stream -----------------------------------------------------

    fn check(&self, token_type: TokenType) -> bool {
        self.current.token_type == token_type
    }

    fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.scan_token();
            if self.current.token_type != TokenType::Error {
                break;
            }
            self.error_at_current(self.current.lexeme);
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) {
        if self.current.token_type == token_type {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn matches(&mut self, token_type: TokenType) -> bool {
        if !self.check(token_type) {
            return false;
        }
        self.advance();
        true
    }

    // --- error reporting / panic mode -------------------------------------

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error_at_previous(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        eprint!("[line {}] Error", token.line);
        match token.token_type {
            TokenType::Eof => eprint!(" at end"),
            TokenType::Error => {}
            _ => eprint!(" at '{}'", token.lexeme),
        }
        eprintln!(": {}", message);
        log::error!("compile error at line {}: {}", token.line, message);
    }

    /// Skips tokens until a likely statement boundary, so a single error
    /// does not cascade into a string of spurious follow-on errors.
    fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.token_type != TokenType::Eof {
            if self.previous.token_type == TokenType::Semicolon {
                return;
            }
            if self.current.token_type == TokenType::Print {
                return;
            }
            self.advance();
        }
    }

    // --- bytecode emission -------------------------------------------------

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_ops(&mut self, a: OpCode, b: OpCode) {
        self.emit_op(a);
        self.emit_op(b);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk.add_constant(value) {
            Ok(index) => index,
            Err(()) => {
                self.error_at_previous("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op(OpCode::Constant);
        self.emit_byte(index);
    }

    // --- declarations / statements ------------------------------------------

    fn declaration(&mut self) {
        self.statement();

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.matches(TokenType::Print) {
            self.print_statement();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    // --- expressions (Pratt parser) -----------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, min_prec: Precedence) {
        self.advance();

        let prefix = get_rule(self.previous.token_type).prefix;
        if prefix == ParseFn::None {
            self.error_at_previous("Expect expression.");
            return;
        }
        self.apply(prefix);

        while get_rule(self.current.token_type).precedence >= min_prec {
            self.advance();
            let infix = get_rule(self.previous.token_type).infix;
            self.apply(infix);
        }
    }

    fn apply(&mut self, action: ParseFn) {
        match action {
            ParseFn::None => {}
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::String => self.string(),
            ParseFn::Literal => self.literal(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self) {
        let value: f64 = self.previous.lexeme.parse().expect("scanner only yields valid numerics");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self) {
        let lexeme = self.previous.lexeme;
        let content = &lexeme[1..lexeme.len() - 1];
        let interned = self.strings.intern(content.to_string());
        self.emit_constant(Value::Obj(interned));
    }

    fn literal(&mut self) {
        match self.previous.token_type {
            TokenType::Nil => self.emit_op(OpCode::Nil),
            TokenType::True => self.emit_op(OpCode::True),
            TokenType::False => self.emit_op(OpCode::False),
            _ => unreachable!("literal() only dispatched for nil/true/false"),
        }
    }

    fn unary(&mut self) {
        let operator = self.previous.token_type;
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenType::Minus => self.emit_op(OpCode::Negate),
            TokenType::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary() only dispatched for '-'/'!'"),
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.token_type;
        let rule = get_rule(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenType::Plus => self.emit_op(OpCode::Add),
            TokenType::Minus => self.emit_op(OpCode::Subtract),
            TokenType::Star => self.emit_op(OpCode::Multiply),
            TokenType::Slash => self.emit_op(OpCode::Divide),
            TokenType::EqualEqual => self.emit_op(OpCode::Equal),
            TokenType::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenType::Greater => self.emit_op(OpCode::Greater),
            TokenType::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenType::Less => self.emit_op(OpCode::Less),
            TokenType::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            _ => unreachable!("binary() only dispatched for operator tokens"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(src: &str) -> Result<Chunk, ()> {
        let mut strings = Table::new();
        Compiler::compile(src, &mut strings)
    }

    #[test]
    fn empty_input_compiles_to_just_return() {
        let chunk = compile("").unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.get_op(0), OpCode::Return);
    }

    #[test]
    fn print_statement_emits_constant_then_print() {
        let chunk = compile("print 1;").unwrap();
        assert_eq!(chunk.get_op(0), OpCode::Constant);
        assert_eq!(chunk.get_op(2), OpCode::Print);
        assert_eq!(chunk.get_op(3), OpCode::Return);
    }

    #[test]
    fn expression_statement_emits_pop() {
        let chunk = compile("1 + 2;").unwrap();
        assert_eq!(chunk.get_op(4), OpCode::Pop);
    }

    #[test]
    fn missing_expression_is_a_compile_error() {
        assert!(compile("print 1 +;").is_err());
    }

    #[test]
    fn missing_semicolon_is_a_compile_error() {
        assert!(compile("print 1").is_err());
    }

    #[test]
    fn the_257th_constant_overflows_the_pool() {
        let mut src = String::new();
        for i in 0..257 {
            src.push_str(&format!("{};", i));
        }
        assert!(compile(&src).is_err());
    }

    #[test]
    fn panic_mode_suppresses_cascading_errors_until_a_semicolon() {
        // Two malformed statements: only one diagnostic line should print,
        // and the overall result is still a single compile error.
        assert!(compile("print 1 +; print 2 +;").is_err());
    }
}
