//! Calculator tool: Evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative), parentheses,
//! unary signs, and decimal numbers. Precedence climbing over a token list.

use relayline_core::error::ToolError;
use relayline_core::tool::Tool;
use tracing::debug;

use crate::input::argument;

pub struct CalculatorTool;

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, and decimals."
    }

    fn parameters_schema(&self) -> &str {
        r#"{"expression": "arithmetic expression, e.g. (2 + 3) * 4"}"#
    }

    fn execute(&self, input: &str) -> Result<String, ToolError> {
        let expr = argument(input, "expression");
        if expr.is_empty() {
            return Err(ToolError::InvalidArguments("Missing expression".into()));
        }
        debug!(expression = %expr, "Evaluating expression");
        let value = evaluate(&expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason,
        })?;
        Ok(format_number(value))
    }
}

/// Integers print without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Expression evaluator ──────────────────────────────────────────────────

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = lex(expr)?;
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }
    let mut cursor = Cursor {
        tokens: &tokens,
        at: 0,
        depth: 0,
    };
    let value = cursor.expression(0)?;
    match cursor.peek() {
        None => Ok(value),
        Some(tok) => Err(format!("Unexpected {tok:?} after complete expression")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn lex(input: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                out.push(Tok::Op(c));
                chars.next();
            }
            '×' => {
                out.push(Tok::Op('*'));
                chars.next();
            }
            '÷' => {
                out.push(Tok::Op('/'));
                chars.next();
            }
            '(' => {
                out.push(Tok::Open);
                chars.next();
            }
            ')' => {
                out.push(Tok::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                out.push(Tok::Num(n));
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }
    Ok(out)
}

/// Binding power and associativity of a binary operator.
fn binding(op: char) -> Option<(u8, bool)> {
    match op {
        '+' | '-' => Some((1, false)),
        '*' | '/' | '%' => Some((2, false)),
        '^' => Some((4, true)),
        _ => None,
    }
}

/// Unary minus binds tighter than `*` but looser than `^`, so `-2^2 == -4`.
const UNARY_POWER: u8 = 3;

/// Bound on nested sub-expressions, so model input can't exhaust the stack.
const MAX_DEPTH: usize = 256;

struct Cursor<'a> {
    tokens: &'a [Tok],
    at: usize,
    depth: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.at).copied()
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.peek();
        if tok.is_some() {
            self.at += 1;
        }
        tok
    }

    fn expression(&mut self, min_power: u8) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nested too deeply".into());
        }
        self.depth += 1;
        let value = self.climb(min_power);
        self.depth -= 1;
        value
    }

    fn climb(&mut self, min_power: u8) -> Result<f64, String> {
        let mut lhs = self.operand()?;

        while let Some(Tok::Op(op)) = self.peek() {
            let Some((power, right_assoc)) = binding(op) else { break };
            if power < min_power {
                break;
            }
            self.bump();
            let next_min = if right_assoc { power } else { power + 1 };
            let rhs = self.expression(next_min)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<f64, String> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(n),
            Some(Tok::Op('-')) => Ok(-self.expression(UNARY_POWER)?),
            Some(Tok::Op('+')) => self.expression(UNARY_POWER),
            Some(Tok::Open) => {
                let inner = self.expression(0)?;
                match self.bump() {
                    Some(Tok::Close) => Ok(inner),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, String> {
    let value = match op {
        '+' => lhs + rhs,
        '-' => lhs - rhs,
        '*' => lhs * rhs,
        '/' | '%' if rhs == 0.0 => return Err("Division by zero".into()),
        '/' => lhs / rhs,
        '%' => lhs % rhs,
        '^' => lhs.powf(rhs),
        _ => return Err(format!("Unknown operator '{op}'")),
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err("Result is not a finite number".into())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
    }

    #[test]
    fn power_is_right_associative_and_beats_unary_minus() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(evaluate("(-2) ^ 2").unwrap(), 4.0);
    }

    #[test]
    fn modulo_and_unicode_operators() {
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(evaluate("6 × 7").unwrap(), 42.0);
        assert_eq!(evaluate("9 ÷ 2").unwrap(), 4.5);
    }

    #[test]
    fn errors_are_reported() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("two + 2").is_err());
    }

    #[test]
    fn deep_nesting_is_rejected_not_overflowed() {
        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&shallow).unwrap(), 1.0);

        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = CalculatorTool.execute(&deep).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));

        let signs = format!("{}1", "-".repeat(100_000));
        assert!(evaluate(&signs).unwrap_err().contains("nested too deeply"));
        assert!(evaluate(&"2^".repeat(100_000)).is_err());
    }

    #[test]
    fn tool_formats_integers_and_decimals() {
        assert_eq!(CalculatorTool.execute("2+2").unwrap(), "4");
        assert_eq!(CalculatorTool.execute("10 / 4").unwrap(), "2.5");
        assert!(CalculatorTool.execute("10 / 3").unwrap().starts_with("3.333"));
    }

    #[test]
    fn tool_accepts_json_input() {
        let out = CalculatorTool.execute(r#"{"expression": "(1 + 2) * 3"}"#).unwrap();
        assert_eq!(out, "9");
    }

    #[test]
    fn tool_failure_names_the_problem() {
        let err = CalculatorTool.execute("5 / 0").unwrap_err();
        assert!(err.to_string().contains("Division by zero"));
        assert!(matches!(CalculatorTool.execute("  "), Err(ToolError::InvalidArguments(_))));
    }
}
