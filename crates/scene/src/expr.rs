//! Restricted color expression grammar
//!
//! Object colors may be given as an expression evaluated per surface point on the GPU. The
//! grammar is fixed: float literals, the inputs `p` (surface point) and `n` (surface
//! normal), the operators `+ - * /`, unary minus, parentheses, swizzles and a whitelist of
//! shading language built-ins. Expressions are parsed into an [`Expr`] tree and rendered
//! back as WGSL through [`fmt::Display`], so the shader never sees unparsed author text.
//! Parsing also tracks the vector width of every sub-expression; a color must come out as
//! a scalar or a three component vector.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | postfix
//! postfix := primary ('.' swizzle)*
//! primary := number | input | builtin '(' expr (',' expr)* ')' | '(' expr ')'
//! ```

use std::fmt;
use thiserror::Error;

/// Nesting limit for parenthesised expressions and calls
const MAX_NESTING: usize = 64;

/// How a built-in maps argument widths to a result width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signature {
    /// One argument, result has the argument's width
    Componentwise,
    /// One vector argument, same width result
    VectorComponentwise,
    /// All arguments share one width, result has that width
    Uniform(usize),
    /// Two same-width vectors, scalar result
    Reduce,
    /// One vector, scalar result
    Length,
    /// Two three component vectors
    Cross,
    /// Two same-width values and a scalar or same-width factor
    Mix,
    /// Vector constructor with the given width
    Construct(u8),
}

/// Built-in functions callable from color expressions
const BUILTINS: &[(&str, Signature)] = &[
    ("abs", Signature::Componentwise),
    ("ceil", Signature::Componentwise),
    ("clamp", Signature::Uniform(3)),
    ("cos", Signature::Componentwise),
    ("cross", Signature::Cross),
    ("distance", Signature::Reduce),
    ("dot", Signature::Reduce),
    ("exp", Signature::Componentwise),
    ("floor", Signature::Componentwise),
    ("fract", Signature::Componentwise),
    ("length", Signature::Length),
    ("max", Signature::Uniform(2)),
    ("min", Signature::Uniform(2)),
    ("mix", Signature::Mix),
    ("normalize", Signature::VectorComponentwise),
    ("pow", Signature::Uniform(2)),
    ("sign", Signature::Componentwise),
    ("sin", Signature::Componentwise),
    ("smoothstep", Signature::Uniform(3)),
    ("sqrt", Signature::Componentwise),
    ("step", Signature::Uniform(2)),
    ("tan", Signature::Componentwise),
    ("vec2f", Signature::Construct(2)),
    ("vec3f", Signature::Construct(3)),
];

/// Names of the built-in functions accepted in color expressions
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

impl Signature {
    fn result_width(self, args: &[u8]) -> Result<u8, String> {
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(format!("takes {n} arguments, got {}", args.len()))
            }
        };
        let same = |widths: &[u8]| {
            if widths.windows(2).all(|w| w[0] == w[1]) {
                Ok(widths[0])
            } else {
                Err(format!("arguments must have the same width, got {widths:?}"))
            }
        };

        match self {
            Signature::Componentwise => {
                arity(1)?;
                Ok(args[0])
            }
            Signature::VectorComponentwise | Signature::Length => {
                arity(1)?;
                if args[0] < 2 {
                    return Err("expects a vector argument".to_string());
                }
                Ok(if self == Signature::Length { 1 } else { args[0] })
            }
            Signature::Uniform(n) => {
                arity(n)?;
                same(args)
            }
            Signature::Reduce => {
                arity(2)?;
                same(args)?;
                if args[0] < 2 {
                    return Err("expects vector arguments".to_string());
                }
                Ok(1)
            }
            Signature::Cross => {
                arity(2)?;
                if args != [3, 3] {
                    return Err("expects two three component vectors".to_string());
                }
                Ok(3)
            }
            Signature::Mix => {
                arity(3)?;
                let width = same(&args[..2])?;
                if args[2] != 1 && args[2] != width {
                    return Err("factor must be a scalar or match the blended values".to_string());
                }
                Ok(width)
            }
            Signature::Construct(width) => {
                if args.is_empty() {
                    return Err(format!("takes 1 to {width} arguments, got 0"));
                }
                let total: u32 = args.iter().map(|w| u32::from(*w)).sum();
                if (args.len() == 1 && args[0] == 1) || total == u32::from(width) {
                    Ok(width)
                } else {
                    Err(format!("arguments add up to {total} components, expected {width}"))
                }
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("column {column}: {message}")]
pub struct ExprError {
    /// 1-based character column inside the expression
    pub column: usize,
    pub message: String,
}

impl ExprError {
    fn new(column: usize, message: impl Into<String>) -> Self {
        Self {
            column,
            message: message.into(),
        }
    }
}

/// Per surface inputs available to an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Surface point `p`
    Point,
    /// Surface normal `n`
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f32),
    Input(Input),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: &'static str,
        args: Vec<Expr>,
    },
    Swizzle {
        base: Box<Expr>,
        components: String,
    },
}

/// A parsed color expression together with the text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ColorExpr {
    source: String,
    root: Expr,
}

impl ColorExpr {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] pointing at the offending column when the text is outside
    /// the grammar.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            end_column: source.chars().count() + 1,
        };
        let (root, width) = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(ExprError::new(
                token.column,
                format!("unexpected {}", token.kind),
            ));
        }
        if width != 1 && width != 3 {
            return Err(ExprError::new(
                1,
                format!("color must be a scalar or a three component vector, got {width} components"),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn root(&self) -> &Expr {
        &self.root
    }
}

impl fmt::Display for ColorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

/// Formats a float as a WGSL literal that always carries a decimal point or exponent
#[must_use]
pub fn float_literal(value: f32) -> String {
    let text = format!("{value:?}");
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => f.write_str(&float_literal(*value)),
            Expr::Input(Input::Point) => f.write_str("p"),
            Expr::Input(Input::Normal) => f.write_str("n"),
            Expr::Negate(inner) => write!(f, "(-{inner})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Call { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")
            }
            Expr::Swizzle { base, components } => write!(f, "{base}.{components}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f32),
    Ident(String),
    Symbol(char),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(v) => write!(f, "number {v}"),
            TokenKind::Ident(name) => write!(f, "identifier `{name}`"),
            TokenKind::Symbol(c) => write!(f, "`{c}`"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    column: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let after_operand = matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::Symbol(')'))
        );
        let starts_number = c.is_ascii_digit()
            || (c == '.' && !after_operand && chars.get(i + 1).is_some_and(char::is_ascii_digit));

        if starts_number {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
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
            let value: f32 = text
                .parse()
                .map_err(|_| ExprError::new(column, format!("malformed number `{text}`")))?;
            if !value.is_finite() {
                return Err(ExprError::new(column, format!("number `{text}` is out of range")));
            }
            tokens.push(Token {
                kind: TokenKind::Number(value),
                column,
            });
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(chars[start..i].iter().collect()),
                column,
            });
        } else if matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | ',' | '.') {
            tokens.push(Token {
                kind: TokenKind::Symbol(c),
                column,
            });
            i += 1;
        } else {
            return Err(ExprError::new(column, format!("unexpected character `{c}`")));
        }
    }

    Ok(tokens)
}

/// An expression and its vector width (1 for scalars)
type Typed = (Expr, u8);

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    end_column: usize,
}

impl Parser<'_> {
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

    fn peek_symbol(&self, symbol: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Symbol(c), .. }) if *c == symbol)
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), ExprError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Symbol(c),
                ..
            }) if c == symbol => Ok(()),
            Some(token) => Err(ExprError::new(
                token.column,
                format!("expected `{symbol}`, found {}", token.kind),
            )),
            None => Err(ExprError::new(
                self.end_column,
                format!("expected `{symbol}`, found end of expression"),
            )),
        }
    }

    fn enter(&mut self, column: usize) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExprError::new(column, "expression is nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Typed, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.peek_symbol('+') {
                BinaryOp::Add
            } else if self.peek_symbol('-') {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            lhs = self.binary(op, lhs, Self::term)?;
        }
    }

    fn term(&mut self) -> Result<Typed, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.peek_symbol('*') {
                BinaryOp::Mul
            } else if self.peek_symbol('/') {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            lhs = self.binary(op, lhs, Self::unary)?;
        }
    }

    /// Consumes the operator token and the right hand side; widths must match unless one
    /// side is a scalar.
    fn binary(
        &mut self,
        op: BinaryOp,
        (lhs, lhs_width): Typed,
        operand: fn(&mut Self) -> Result<Typed, ExprError>,
    ) -> Result<Typed, ExprError> {
        let column = self.peek().map_or(self.end_column, |t| t.column);
        self.pos += 1;
        let (rhs, rhs_width) = operand(self)?;
        let width = match (lhs_width, rhs_width) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            (a, b) => {
                return Err(ExprError::new(
                    column,
                    format!("cannot apply `{}` to {a} and {b} component values", op.symbol()),
                ))
            }
        };
        let expr = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
        Ok((expr, width))
    }

    fn unary(&mut self) -> Result<Typed, ExprError> {
        if self.peek_symbol('-') {
            let column = self.peek().map_or(self.end_column, |t| t.column);
            self.pos += 1;
            self.enter(column)?;
            let (inner, width) = self.unary()?;
            self.depth -= 1;
            return Ok((Expr::Negate(Box::new(inner)), width));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Typed, ExprError> {
        let (mut base, mut width) = self.primary()?;
        while self.peek_symbol('.') {
            self.pos += 1;
            match self.next() {
                Some(Token {
                    kind: TokenKind::Ident(components),
                    column,
                }) => {
                    width = swizzle_width(&components, width, column)?;
                    base = Expr::Swizzle {
                        base: Box::new(base),
                        components,
                    };
                }
                Some(token) => {
                    return Err(ExprError::new(
                        token.column,
                        format!("expected swizzle, found {}", token.kind),
                    ))
                }
                None => {
                    return Err(ExprError::new(
                        self.end_column,
                        "expected swizzle, found end of expression",
                    ))
                }
            }
        }
        Ok((base, width))
    }

    fn primary(&mut self) -> Result<Typed, ExprError> {
        let Some(token) = self.next() else {
            return Err(ExprError::new(
                self.end_column,
                "unexpected end of expression",
            ));
        };

        match token.kind {
            TokenKind::Number(value) => Ok((Expr::Number(value), 1)),
            TokenKind::Symbol('(') => {
                self.enter(token.column)?;
                let inner = self.expr()?;
                self.expect_symbol(')')?;
                self.depth -= 1;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.peek_symbol('(') {
                    self.pos += 1;
                    self.enter(token.column)?;
                    let call = self.call(&name, token.column)?;
                    self.depth -= 1;
                    return Ok(call);
                }
                match name.as_str() {
                    "p" => Ok((Expr::Input(Input::Point), 3)),
                    "n" => Ok((Expr::Input(Input::Normal), 3)),
                    _ => Err(ExprError::new(
                        token.column,
                        format!("unknown identifier `{name}` (inputs are `p` and `n`)"),
                    )),
                }
            }
            kind => Err(ExprError::new(token.column, format!("unexpected {kind}"))),
        }
    }

    fn call(&mut self, name: &str, column: usize) -> Result<Typed, ExprError> {
        let Some(&(function, signature)) = BUILTINS.iter().find(|(builtin, _)| *builtin == name)
        else {
            return Err(ExprError::new(column, format!("unknown function `{name}`")));
        };

        let mut args = Vec::new();
        let mut widths = Vec::new();
        if !self.peek_symbol(')') {
            loop {
                let (arg, width) = self.expr()?;
                args.push(arg);
                widths.push(width);
                if self.peek_symbol(',') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect_symbol(')')?;

        let width = signature
            .result_width(&widths)
            .map_err(|message| ExprError::new(column, format!("`{name}` {message}")))?;
        Ok((Expr::Call { function, args }, width))
    }
}

/// Width of `base.components`, or an error when the swizzle is malformed or reads past
/// the end of the base value
fn swizzle_width(components: &str, base_width: u8, column: usize) -> Result<u8, ExprError> {
    let index = |c: char| "xyzw".find(c).or_else(|| "rgba".find(c));
    let same_set = components.chars().all(|c| "xyzw".contains(c))
        || components.chars().all(|c| "rgba".contains(c));
    let valid = base_width > 1
        && !components.is_empty()
        && components.len() <= 4
        && same_set
        && components
            .chars()
            .all(|c| index(c).is_some_and(|i| i < usize::from(base_width)));
    let invalid = || ExprError::new(column, format!("invalid swizzle `{components}`"));
    if valid {
        u8::try_from(components.len()).map_err(|_| invalid())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> String {
        ColorExpr::parse(source).unwrap().to_string()
    }

    #[test]
    fn precedence_is_explicit_in_output() {
        assert_eq!(render("1 + 2 * p.x"), "(1.0 + (2.0 * p.x))");
        assert_eq!(render("(1 + 2) * n"), "((1.0 + 2.0) * n)");
        assert_eq!(render("-p.y - 1"), "((-p.y) - 1.0)");
    }

    #[test]
    fn builtins_and_swizzles() {
        assert_eq!(
            render("mix(vec3f(1, 0, 0), vec3f(0.5), fract(p.x * 4.0))"),
            "mix(vec3f(1.0, 0.0, 0.0), vec3f(0.5), fract((p.x * 4.0)))"
        );
        assert_eq!(render("abs(n).zyx"), "abs(n).zyx");
        assert_eq!(render(".5 * n.rgb"), "(0.5 * n.rgb)");
        assert_eq!(render("vec3f(1e-2)"), "vec3f(0.01)");
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        let err = ColorExpr::parse("vec3f(q.x)").unwrap_err();
        assert_eq!(err.column, 7);

        let err = ColorExpr::parse("textureLoad(p)").unwrap_err();
        assert_eq!(err.column, 1);
        assert!(err.message.contains("unknown function"));
    }

    #[test]
    fn syntax_errors_carry_columns() {
        let err = ColorExpr::parse("vec3f(p.x,").unwrap_err();
        assert_eq!(err.column, 11);

        let err = ColorExpr::parse("p.x ; n").unwrap_err();
        assert_eq!(err.column, 5);

        let err = ColorExpr::parse("p.q").unwrap_err();
        assert_eq!(err.column, 3);

        assert!(ColorExpr::parse("p.xg").is_err());
        assert!(ColorExpr::parse("").is_err());
        assert!(ColorExpr::parse("p n").is_err());
    }

    #[test]
    fn arity_is_checked() {
        let err = ColorExpr::parse("mix(p, n)").unwrap_err();
        assert!(err.message.contains("takes 3 arguments"));
        assert!(ColorExpr::parse("vec3f()").is_err());
    }

    #[test]
    fn widths_are_checked() {
        assert!(ColorExpr::parse("vec3f(p.xy, 1.0)").is_ok());
        assert!(ColorExpr::parse("length(p) * n").is_ok());
        assert!(ColorExpr::parse("cross(p, n) + 0.5").is_ok());

        let err = ColorExpr::parse("p.xy").unwrap_err();
        assert!(err.message.contains("2 components"));

        let err = ColorExpr::parse("p + p.xy").unwrap_err();
        assert_eq!(err.column, 3);

        assert!(ColorExpr::parse("max(p, 0.5)").is_err());
        assert!(ColorExpr::parse("p.w").is_err());
        assert!(ColorExpr::parse("(1.0).x").is_err());
        assert!(ColorExpr::parse("vec3f(p.xy)").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}p{}", "(".repeat(100), ")".repeat(100));
        let err = ColorExpr::parse(&deep).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn float_literals_always_have_a_point() {
        assert_eq!(float_literal(1.0), "1.0");
        assert_eq!(float_literal(0.25), "0.25");
        assert_eq!(float_literal(-3.0), "-3.0");
    }
}
