//! Calculator tool — evaluates mathematical expressions.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, and unary negation.
//! Shunting-yard evaluation with two stacks; no dependencies beyond std.

use async_trait::async_trait;
use loopcraft_core::error::ToolError;
use loopcraft_core::tool::Tool;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, parentheses, and decimal numbers. Input: {\"expression\": \"(2 + 3) * 4\"}"
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;

        // Integers print without a trailing .0
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(format!("{}", value as i64))
        } else {
            Ok(format!("{value}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    LParen,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
            Op::Neg => 3,
            Op::LParen => 0,
        }
    }
}

/// Evaluate an arithmetic expression with the shunting-yard algorithm:
/// numbers go straight to the value stack, operators wait on the operator
/// stack until a higher-or-equal precedence operator forces them to apply.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut values: Vec<f64> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    // True when the next token may be a unary minus (start, after '(' or an operator).
    let mut expect_operand = true;

    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                ops.push(Op::LParen);
                expect_operand = true;
                i += 1;
            }
            ')' => {
                while let Some(&op) = ops.last() {
                    if op == Op::LParen {
                        break;
                    }
                    apply(ops.pop().ok_or("operator stack underflow")?, &mut values)?;
                }
                if ops.pop() != Some(Op::LParen) {
                    return Err("Unbalanced parentheses".into());
                }
                expect_operand = false;
                i += 1;
            }
            '+' | '-' | '*' | '/' => {
                let op = match c {
                    '-' if expect_operand => Op::Neg,
                    '+' => Op::Add,
                    '-' => Op::Sub,
                    '*' => Op::Mul,
                    _ => Op::Div,
                };
                if op != Op::Neg && expect_operand {
                    return Err(format!("Unexpected operator: '{c}'"));
                }
                while let Some(&top) = ops.last() {
                    // Unary minus is right-associative; binaries are left-associative.
                    let should_apply = if op == Op::Neg {
                        top.precedence() > op.precedence()
                    } else {
                        top.precedence() >= op.precedence()
                    };
                    if top == Op::LParen || !should_apply {
                        break;
                    }
                    apply(ops.pop().ok_or("operator stack underflow")?, &mut values)?;
                }
                ops.push(op);
                expect_operand = true;
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                values.push(num);
                expect_operand = false;
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }

    while let Some(op) = ops.pop() {
        if op == Op::LParen {
            return Err("Unbalanced parentheses".into());
        }
        apply(op, &mut values)?;
    }

    match values.as_slice() {
        [value] => Ok(*value),
        [] => Err("Empty expression".into()),
        _ => Err("Malformed expression".into()),
    }
}

fn apply(op: Op, values: &mut Vec<f64>) -> Result<(), String> {
    if op == Op::Neg {
        let v = values.pop().ok_or("Missing operand")?;
        values.push(-v);
        return Ok(());
    }
    let right = values.pop().ok_or("Missing operand")?;
    let left = values.pop().ok_or("Missing operand")?;
    let result = match op {
        Op::Add => left + right,
        Op::Sub => left - right,
        Op::Mul => left * right,
        Op::Div => {
            if right == 0.0 {
                return Err("Division by zero".into());
            }
            left / right
        }
        Op::Neg | Op::LParen => unreachable!(),
    };
    values.push(result);
    Ok(())
}
