//! User-supplied maps written as expressions, e.g. `"r * x * (1 - x)"`.
//!
//! Source text is parsed to an [`Expr`] tree, checked, and compiled to a flat
//! [`Bytecode`] program that the stack [`VM`] runs once per map evaluation.
//! The VM keeps its operand stack in a fixed-size array, so evaluating an
//! [`ExpressionMap`] never allocates and the map can be shared across threads.

use crate::traits::{lit, IteratedMap, Scalar};
use anyhow::{anyhow, bail, Result};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Deepest operand stack a compiled expression may need.
pub const MAX_STACK_DEPTH: usize = 32;

/// Deepest nesting of parentheses, operators and calls the parser accepts.
/// Bounds both parser recursion and the height of the resulting tree.
pub const MAX_NESTING: usize = 256;

/// Names accepted for the population variable unless overridden.
pub const DEFAULT_POP_NAMES: &[&str] = &["x", "pop"];
/// Names accepted for the rate parameter unless overridden.
pub const DEFAULT_RATE_NAMES: &[&str] = &["r", "rate"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    LoadConst(f64),
    LoadPop,
    LoadRate,
    Add,
    Sub,
    Mul,
    Div,
    /// Pops (b, a), pushes a^b.
    Pow,
    /// Raises the top of the stack to a literal integer power.
    PowI(i32),
    Neg,
    Call(Function),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "sqrt" => Some(Function::Sqrt),
            "abs" => Some(Function::Abs),
            _ => None,
        }
    }

    #[inline(always)]
    fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
        }
    }
}

/// A compiled, stack-checked program. Only [`Compiler`] builds one, so every
/// `Bytecode` leaves exactly one value on a stack of at most
/// [`MAX_STACK_DEPTH`] slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    ops: Vec<OpCode>,
    max_depth: usize,
}

impl Bytecode {
    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

pub struct VM;

impl VM {
    #[inline]
    pub fn execute<T: Scalar>(bytecode: &Bytecode, pop: T, rate: T) -> T {
        let mut stack = [T::zero(); MAX_STACK_DEPTH];
        let mut sp = 0usize;

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(value) => {
                    stack[sp] = lit(value);
                    sp += 1;
                }
                OpCode::LoadPop => {
                    stack[sp] = pop;
                    sp += 1;
                }
                OpCode::LoadRate => {
                    stack[sp] = rate;
                    sp += 1;
                }
                OpCode::Add => {
                    sp -= 1;
                    stack[sp - 1] = stack[sp - 1] + stack[sp];
                }
                OpCode::Sub => {
                    sp -= 1;
                    stack[sp - 1] = stack[sp - 1] - stack[sp];
                }
                OpCode::Mul => {
                    sp -= 1;
                    stack[sp - 1] = stack[sp - 1] * stack[sp];
                }
                OpCode::Div => {
                    sp -= 1;
                    stack[sp - 1] = stack[sp - 1] / stack[sp];
                }
                OpCode::Pow => {
                    sp -= 1;
                    stack[sp - 1] = stack[sp - 1].powf(stack[sp]);
                }
                OpCode::PowI(n) => stack[sp - 1] = stack[sp - 1].powi(n),
                OpCode::Neg => stack[sp - 1] = -stack[sp - 1],
                OpCode::Call(func) => stack[sp - 1] = func.apply(stack[sp - 1]),
            }
        }

        stack[0]
    }
}

// --- AST & Parser ---

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Symbol(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 3,
        }
    }

    fn right_associative(self) -> bool {
        matches!(self, BinaryOp::Pow)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(BinaryOp),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            tokens.push(Token::Number(lex_number(&mut chars)?));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(ident));
        } else {
            let token = match c {
                '+' => Token::Op(BinaryOp::Add),
                '-' => Token::Op(BinaryOp::Sub),
                '*' => Token::Op(BinaryOp::Mul),
                '/' => Token::Op(BinaryOp::Div),
                '^' => Token::Op(BinaryOp::Pow),
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => bail!("Unexpected character '{other}' in expression."),
            };
            tokens.push(token);
            chars.next();
        }
    }
    Ok(tokens)
}

fn lex_number(chars: &mut Peekable<Chars<'_>>) -> Result<f64> {
    let mut text = String::new();
    while let Some(&d) = chars.peek() {
        if d.is_ascii_digit() || d == '.' {
            text.push(d);
            chars.next();
        } else if (d == 'e' || d == 'E') && !text.contains(['e', 'E']) {
            text.push(d);
            chars.next();
            if let Some(&sign) = chars.peek() {
                if sign == '+' || sign == '-' {
                    text.push(sign);
                    chars.next();
                }
            }
        } else {
            break;
        }
    }
    text.parse()
        .map_err(|_| anyhow!("Malformed number literal \"{text}\"."))
}

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        bail!("Expression is empty.");
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let (expr, _height) = parser.parse_binary(0)?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected trailing token {token:?}.");
    }
    Ok(expr)
}

/// A parsed subtree and its height.
type Parsed = (Expr, usize);

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn check_nesting(height: usize) -> Result<usize> {
    if height > MAX_NESTING {
        bail!("Expression nests deeper than {MAX_NESTING} levels.");
    }
    Ok(height)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => bail!("Expected ')'."),
        }
    }

    /// Precedence climbing over `+ - * / ^`. Every nested subexpression
    /// passes through here, so this is where recursion depth is counted.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Parsed> {
        self.depth += 1;
        let parsed = check_nesting(self.depth).and_then(|_| self.parse_operators(min_prec));
        self.depth -= 1;
        parsed
    }

    fn parse_operators(&mut self, min_prec: u8) -> Result<Parsed> {
        let (mut left, mut height) = self.parse_unary()?;

        while let Some(&Token::Op(op)) = self.peek() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let next_min = if op.right_associative() { prec } else { prec + 1 };
            let (right, right_height) = self.parse_binary(next_min)?;
            height = check_nesting(height.max(right_height) + 1)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok((left, height))
    }

    // Unary minus binds looser than `^`, so `-x^2` is `-(x^2)`.
    fn parse_unary(&mut self) -> Result<Parsed> {
        match self.peek() {
            Some(Token::Op(BinaryOp::Sub)) => {
                self.pos += 1;
                let (operand, height) = self.parse_binary(BinaryOp::Pow.precedence())?;
                Ok((Expr::Neg(Box::new(operand)), check_nesting(height + 1)?))
            }
            Some(Token::Op(BinaryOp::Add)) => {
                self.pos += 1;
                self.parse_binary(BinaryOp::Pow.precedence())
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Parsed> {
        match self.next() {
            Some(Token::Number(n)) => Ok((Expr::Number(n), 1)),
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let (arg, height) = self.parse_binary(0)?;
                    self.expect_rparen()?;
                    Ok((Expr::Call(name, Box::new(arg)), check_nesting(height + 1)?))
                } else {
                    Ok((Expr::Symbol(name), 1))
                }
            }
            Some(Token::LParen) => {
                let parsed = self.parse_binary(0)?;
                self.expect_rparen()?;
                Ok(parsed)
            }
            Some(token) => bail!("Unexpected token {token:?}."),
            None => bail!("Unexpected end of expression."),
        }
    }
}

// --- Compiler ---

/// Resolves symbols and lowers an [`Expr`] to [`Bytecode`].
pub struct Compiler<'a> {
    pop_names: &'a [&'a str],
    rate_names: &'a [&'a str],
}

impl<'a> Compiler<'a> {
    pub fn new(pop_names: &'a [&'a str], rate_names: &'a [&'a str]) -> Self {
        Self {
            pop_names,
            rate_names,
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.lower(expr, &mut ops)?;
        let max_depth = stack_depth(&ops);
        if max_depth > MAX_STACK_DEPTH {
            bail!(
                "Expression needs a stack of {max_depth} values; at most {MAX_STACK_DEPTH} are supported."
            );
        }
        Ok(Bytecode { ops, max_depth })
    }

    fn lower(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Symbol(name) => ops.push(self.resolve(name)?),
            Expr::Binary(left, BinaryOp::Pow, right) => {
                self.lower(left, ops)?;
                match integer_exponent(right) {
                    Some(n) => ops.push(OpCode::PowI(n)),
                    None => {
                        self.lower(right, ops)?;
                        ops.push(OpCode::Pow);
                    }
                }
            }
            Expr::Binary(left, op, right) => {
                self.lower(left, ops)?;
                self.lower(right, ops)?;
                ops.push(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Pow => OpCode::Pow,
                });
            }
            Expr::Neg(operand) => {
                self.lower(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(name, arg) => {
                let func = Function::lookup(name)
                    .ok_or_else(|| anyhow!("Unknown function: {name}"))?;
                self.lower(arg, ops)?;
                ops.push(OpCode::Call(func));
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<OpCode> {
        if self.pop_names.contains(&name) {
            Ok(OpCode::LoadPop)
        } else if self.rate_names.contains(&name) {
            Ok(OpCode::LoadRate)
        } else if name == "pi" {
            Ok(OpCode::LoadConst(std::f64::consts::PI))
        } else {
            bail!("Unknown variable or parameter: {name}")
        }
    }
}

fn integer_exponent(expr: &Expr) -> Option<i32> {
    match expr {
        Expr::Number(n) if n.fract() == 0.0 && n.abs() <= i32::MAX as f64 => Some(*n as i32),
        _ => None,
    }
}

fn stack_depth(ops: &[OpCode]) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for op in ops {
        match op {
            OpCode::LoadConst(_) | OpCode::LoadPop | OpCode::LoadRate => depth += 1,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => depth -= 1,
            OpCode::PowI(_) | OpCode::Neg | OpCode::Call(_) => {}
        }
        max_depth = max_depth.max(depth);
    }
    max_depth
}

// --- ExpressionMap ---

/// An [`IteratedMap`] defined by a compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMap {
    source: String,
    bytecode: Bytecode,
}

impl ExpressionMap {
    /// Compiles `source` with `x`/`pop` as the population and `r`/`rate` as
    /// the growth rate.
    pub fn compile(source: &str) -> Result<Self> {
        Self::compile_with(source, DEFAULT_POP_NAMES, DEFAULT_RATE_NAMES)
    }

    pub fn compile_with(source: &str, pop_names: &[&str], rate_names: &[&str]) -> Result<Self> {
        if let Some(name) = pop_names.iter().find(|name| rate_names.contains(*name)) {
            bail!("Symbol \"{name}\" cannot name both the population and the rate.");
        }
        let expr = parse(source)?;
        let bytecode = Compiler::new(pop_names, rate_names).compile(&expr)?;
        Ok(Self {
            source: source.trim().to_string(),
            bytecode,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }
}

impl<T: Scalar> IteratedMap<T> for ExpressionMap {
    #[inline]
    fn evaluate(&self, pop: T, rate: T) -> T {
        VM::execute(&self.bytecode, pop, rate)
    }
}

impl fmt::Display for ExpressionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
