//! Arithmetic expressions over a variable vector `x`, compiled once into a
//! stack program.
//!
//! Grammar: numbers, `x[i]` (or bare `x` for one-dimensional functions),
//! `+ - * / ^` (`**` is accepted for `^`), unary minus, parentheses and the
//! functions `sin cos tan exp ln sqrt abs`.

/// Deepest nesting of unary operators, powers and parentheses accepted.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "exp" => Self::Exp,
            "ln" | "log" => Self::Ln,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            _ => return None,
        })
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            Self::Sin => v.sin(),
            Self::Cos => v.cos(),
            Self::Tan => v.tan(),
            Self::Exp => v.exp(),
            Self::Ln => v.ln(),
            Self::Sqrt => v.sqrt(),
            Self::Abs => v.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OpCode {
    LoadVar(usize),
    LoadConst(f64),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Call(Func),
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    instructions: Vec<OpCode>,
    max_stack: usize,
}

impl CompiledExpression {
    /// Compile `source` for a variable vector of length `dimension`.
    pub fn compile(source: &str, dimension: usize) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err("expression is empty".into());
        }
        let mut compiler = Compiler {
            tokens,
            pos: 0,
            dimension,
            depth: 0,
            instructions: Vec::with_capacity(32),
        };
        compiler.parse_additive()?;
        if let Some(token) = compiler.tokens.get(compiler.pos) {
            return Err(format!("unexpected {token:?} after end of expression"));
        }
        let max_stack = stack_depth(&compiler.instructions);
        Ok(Self {
            instructions: compiler.instructions,
            max_stack,
        })
    }

    /// Evaluate against `vars`. Fails on division by zero.
    pub fn evaluate(&self, vars: &[f64]) -> Result<f64, &'static str> {
        let mut stack: Vec<f64> = Vec::with_capacity(self.max_stack);
        for &inst in &self.instructions {
            match inst {
                OpCode::LoadVar(idx) => {
                    stack.push(*vars.get(idx).ok_or("variable index out of range")?)
                }
                OpCode::LoadConst(v) => stack.push(v),
                OpCode::Neg => {
                    let v = stack.pop().ok_or("stack underflow")?;
                    stack.push(-v);
                }
                OpCode::Call(func) => {
                    let v = stack.pop().ok_or("stack underflow")?;
                    stack.push(func.apply(v));
                }
                binary => {
                    let rhs = stack.pop().ok_or("stack underflow")?;
                    let lhs = stack.pop().ok_or("stack underflow")?;
                    let result = match binary {
                        OpCode::Add => lhs + rhs,
                        OpCode::Sub => lhs - rhs,
                        OpCode::Mul => lhs * rhs,
                        OpCode::Div => {
                            if rhs == 0.0 {
                                return Err("division by zero");
                            }
                            lhs / rhs
                        }
                        OpCode::Pow => lhs.powf(rhs),
                        _ => unreachable!("non-binary opcode handled above"),
                    };
                    stack.push(result);
                }
            }
        }
        match stack.as_slice() {
            [result] => Ok(*result),
            _ => Err("invalid expression"),
        }
    }
}

fn stack_depth(instructions: &[OpCode]) -> usize {
    let mut depth: usize = 0;
    let mut max = 0;
    for inst in instructions {
        match inst {
            OpCode::LoadVar(_) | OpCode::LoadConst(_) => depth += 1,
            OpCode::Neg | OpCode::Call(_) => {}
            _ => depth = depth.saturating_sub(1),
        }
        max = max.max(depth);
    }
    max
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent, e.g. 1e-3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op('^'));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Compiler {
    tokens: Vec<Token>,
    pos: usize,
    dimension: usize,
    depth: usize,
    instructions: Vec<OpCode>,
}

impl Compiler {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    fn parse_additive(&mut self) -> Result<(), String> {
        self.parse_multiplicative()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            self.parse_multiplicative()?;
            self.instructions
                .push(if op == '+' { OpCode::Add } else { OpCode::Sub });
        }
        Ok(())
    }

    fn parse_multiplicative(&mut self) -> Result<(), String> {
        self.parse_unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            self.parse_unary()?;
            self.instructions
                .push(if op == '*' { OpCode::Mul } else { OpCode::Div });
        }
        Ok(())
    }

    // Every recursive path of the grammar passes through here.
    fn parse_unary(&mut self) -> Result<(), String> {
        if self.depth >= MAX_NESTING {
            return Err(format!("expression nested deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        let result = self.parse_unary_inner();
        self.depth -= 1;
        result
    }

    fn parse_unary_inner(&mut self) -> Result<(), String> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                self.parse_unary()?;
                self.instructions.push(OpCode::Neg);
                Ok(())
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // right associative: 2^3^2 == 2^(3^2)
    fn parse_power(&mut self) -> Result<(), String> {
        self.parse_atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            self.parse_unary()?;
            self.instructions.push(OpCode::Pow);
        }
        Ok(())
    }

    fn parse_atom(&mut self) -> Result<(), String> {
        match self.next() {
            Some(Token::Number(v)) => {
                self.instructions.push(OpCode::LoadConst(v));
                Ok(())
            }
            Some(Token::LParen) => {
                self.parse_additive()?;
                self.expect(Token::RParen)
            }
            Some(Token::Ident(name)) if name == "x" => self.parse_variable(),
            Some(Token::Ident(name)) => {
                if name == "pi" {
                    self.instructions.push(OpCode::LoadConst(std::f64::consts::PI));
                    return Ok(());
                }
                let func = Func::lookup(&name).ok_or_else(|| format!("unknown identifier '{name}'"))?;
                self.expect(Token::LParen)?;
                self.parse_additive()?;
                self.expect(Token::RParen)?;
                self.instructions.push(OpCode::Call(func));
                Ok(())
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn parse_variable(&mut self) -> Result<(), String> {
        if self.peek() != Some(&Token::LBracket) {
            if self.dimension == 1 {
                self.instructions.push(OpCode::LoadVar(0));
                return Ok(());
            }
            return Err("bare 'x' is only allowed for one-dimensional functions".into());
        }
        self.pos += 1;
        let index = match self.next() {
            Some(Token::Number(v)) if v.fract() == 0.0 && v >= 0.0 => v as usize,
            other => return Err(format!("expected an index after 'x[', found {other:?}")),
        };
        self.expect(Token::RBracket)?;
        if index >= self.dimension {
            return Err(format!(
                "x[{index}] is out of range for dimension {}",
                self.dimension
            ));
        }
        self.instructions.push(OpCode::LoadVar(index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, vars: &[f64]) -> f64 {
        CompiledExpression::compile(source, vars.len())
            .unwrap()
            .evaluate(vars)
            .unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3", &[0.0]), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[0.0]), 9.0);
        assert_eq!(eval("10 - 4 - 3", &[0.0]), 3.0);
        assert_eq!(eval("2 ^ 3 ^ 2", &[0.0]), 512.0);
        assert_eq!(eval("-2 ^ 2", &[0.0]), -4.0);
        assert_eq!(eval("2 ** 3", &[0.0]), 8.0);
    }

    #[test]
    fn variables_and_functions() {
        assert_eq!(eval("x[0]^2 + x[1]^2", &[3.0, 4.0]), 25.0);
        assert_eq!(eval("sqrt(x[0]^2 + x[1]^2)", &[3.0, 4.0]), 5.0);
        assert_eq!(eval("abs(x) - 1e1", &[-2.0]), -8.0);
        assert!((eval("cos(pi)", &[0.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn compile_errors() {
        assert!(CompiledExpression::compile("", 1).is_err());
        assert!(CompiledExpression::compile("1 +", 1).is_err());
        assert!(CompiledExpression::compile("(1 + 2", 1).is_err());
        assert!(CompiledExpression::compile("x[2]", 2).is_err());
        assert!(CompiledExpression::compile("x", 2).is_err());
        assert!(CompiledExpression::compile("foo(1)", 1).is_err());
        assert!(CompiledExpression::compile("1 $ 2", 1).is_err());
        assert!(CompiledExpression::compile("1 2", 1).is_err());
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing_further() {
        let minus = format!("{}x", "-".repeat(200_000));
        let err = CompiledExpression::compile(&minus, 1).unwrap_err();
        assert!(err.contains("nested deeper"));

        let parens = format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(CompiledExpression::compile(&parens, 1).is_err());

        let powers = vec!["2"; 100_000].join("^");
        assert!(CompiledExpression::compile(&powers, 1).is_err());

        let shallow = format!("{}x{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(CompiledExpression::compile(&shallow, 1).unwrap().evaluate(&[3.0]), Ok(3.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let expr = CompiledExpression::compile("1 / x", 1).unwrap();
        assert!(expr.evaluate(&[0.0]).is_err());
        assert_eq!(expr.evaluate(&[4.0]), Ok(0.25));
    }
}
