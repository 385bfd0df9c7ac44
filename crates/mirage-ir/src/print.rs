//! IR pretty-printing
//!
//! `Display` implementations for expressions and statements: parenthesized
//! infix for expressions, an indented block layout for statements. Every
//! debugging surface (CLI dumps, test failures, trace logs) renders through
//! these.

use crate::expr::{CallType, Expr, ExprKind};
use crate::stmt::{ForType, Stmt, StmtKind};
use std::fmt;

impl fmt::Display for ForType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForType::Serial => write!(f, "serial"),
            ForType::Parallel => write!(f, "parallel"),
            ForType::Vectorized => write!(f, "vectorized"),
            ForType::Unrolled => write!(f, "unrolled"),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::Image => write!(f, "image"),
            CallType::Extern => write!(f, "extern"),
            CallType::Stage => write!(f, "stage"),
            CallType::Intrinsic => write!(f, "intrinsic"),
        }
    }
}

fn write_binary(f: &mut fmt::Formatter<'_>, a: &Expr, op: &str, b: &Expr) -> fmt::Result {
    write!(f, "({} {} {})", a, op, b)
}

fn write_call(f: &mut fmt::Formatter<'_>, name: &str, args: &[Expr]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(kind) = self.kind() else {
            return write!(f, "<undefined>");
        };
        match kind {
            ExprKind::IntImm { value } => write!(f, "{}", value),
            ExprKind::FloatImm { value } => write!(f, "{:?}f", value),
            ExprKind::StringImm { value } => write!(f, "\"{}\"", value.escape_default()),
            ExprKind::Cast { value } => write!(f, "{}({})", self.ty(), value),
            ExprKind::Variable { name, .. } => write!(f, "{}", name),
            ExprKind::Add { a, b } => write_binary(f, a, "+", b),
            ExprKind::Sub { a, b } => write_binary(f, a, "-", b),
            ExprKind::Mul { a, b } => write_binary(f, a, "*", b),
            ExprKind::Div { a, b } => write_binary(f, a, "/", b),
            ExprKind::Mod { a, b } => write_binary(f, a, "%", b),
            ExprKind::Min { a, b } => write!(f, "min({}, {})", a, b),
            ExprKind::Max { a, b } => write!(f, "max({}, {})", a, b),
            ExprKind::EQ { a, b } => write_binary(f, a, "==", b),
            ExprKind::NE { a, b } => write_binary(f, a, "!=", b),
            ExprKind::LT { a, b } => write_binary(f, a, "<", b),
            ExprKind::LE { a, b } => write_binary(f, a, "<=", b),
            ExprKind::GT { a, b } => write_binary(f, a, ">", b),
            ExprKind::GE { a, b } => write_binary(f, a, ">=", b),
            ExprKind::And { a, b } => write_binary(f, a, "&&", b),
            ExprKind::Or { a, b } => write_binary(f, a, "||", b),
            ExprKind::Not { a } => write!(f, "!{}", a),
            ExprKind::Select {
                condition,
                true_value,
                false_value,
            } => write!(f, "select({}, {}, {})", condition, true_value, false_value),
            ExprKind::Load { name, index, .. } => write!(f, "{}[{}]", name, index),
            ExprKind::Ramp { base, stride, width } => {
                write!(f, "ramp({}, {}, {})", base, stride, width)
            }
            ExprKind::Broadcast { value, width } => write!(f, "x{}({})", width, value),
            ExprKind::Call { name, args, .. } => write_call(f, name, args),
            ExprKind::Let { name, value, body } => {
                write!(f, "(let {} = {} in {})", name, value, body)
            }
        }
    }
}

/// Writes a statement tree with two-space indentation per nesting level.
struct StmtPrinter<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    indent: usize,
}

impl StmtPrinter<'_, '_> {
    fn line_start(&mut self) -> fmt::Result {
        write!(self.f, "{:indent$}", "", indent = self.indent)
    }

    fn nested(&mut self, stmt: &Stmt) -> fmt::Result {
        self.indent += 2;
        self.print(stmt)?;
        self.indent -= 2;
        Ok(())
    }

    fn print(&mut self, stmt: &Stmt) -> fmt::Result {
        let Some(kind) = stmt.kind() else {
            return Ok(());
        };
        match kind {
            StmtKind::LetStmt { name, value, body } => {
                self.line_start()?;
                writeln!(self.f, "let {} = {}", name, value)?;
                self.print(body)
            }
            StmtKind::AssertStmt { condition, message } => {
                self.line_start()?;
                if message.defined() {
                    writeln!(self.f, "assert({}, {})", condition, message)
                } else {
                    writeln!(self.f, "assert({})", condition)
                }
            }
            StmtKind::Pipeline {
                name,
                produce,
                update,
                consume,
            } => {
                self.line_start()?;
                writeln!(self.f, "produce {} {{", name)?;
                self.nested(produce)?;
                if update.defined() {
                    self.line_start()?;
                    writeln!(self.f, "}} update {} {{", name)?;
                    self.nested(update)?;
                }
                self.line_start()?;
                writeln!(self.f, "}} consume {} {{", name)?;
                self.nested(consume)?;
                self.line_start()?;
                writeln!(self.f, "}}")
            }
            StmtKind::For {
                name,
                min,
                extent,
                for_type,
                body,
            } => {
                self.line_start()?;
                let keyword = match for_type {
                    ForType::Serial => "for",
                    ForType::Parallel => "parallel for",
                    ForType::Vectorized => "vectorized for",
                    ForType::Unrolled => "unrolled for",
                };
                writeln!(self.f, "{} ({}, {}, {}) {{", keyword, name, min, extent)?;
                self.nested(body)?;
                self.line_start()?;
                writeln!(self.f, "}}")
            }
            StmtKind::Store { name, value, index } => {
                self.line_start()?;
                writeln!(self.f, "{}[{}] = {}", name, index, value)
            }
            StmtKind::Provide { name, values, args } => {
                self.line_start()?;
                write!(self.f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(self.f, ", ")?;
                    }
                    write!(self.f, "{}", arg)?;
                }
                write!(self.f, ") = ")?;
                if values.len() == 1 {
                    writeln!(self.f, "{}", values[0])
                } else {
                    write!(self.f, "(")?;
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            write!(self.f, ", ")?;
                        }
                        write!(self.f, "{}", value)?;
                    }
                    writeln!(self.f, ")")
                }
            }
            StmtKind::Allocate {
                name,
                ty,
                extents,
                condition,
                body,
            } => {
                self.line_start()?;
                write!(self.f, "allocate {}[{}", name, ty)?;
                for extent in extents {
                    write!(self.f, " * {}", extent)?;
                }
                writeln!(self.f, "] if {}", condition)?;
                self.print(body)
            }
            StmtKind::Free { name } => {
                self.line_start()?;
                writeln!(self.f, "free {}", name)
            }
            StmtKind::Realize {
                name,
                types,
                bounds,
                condition,
                body,
            } => {
                self.line_start()?;
                write!(self.f, "realize {}<", name)?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        write!(self.f, ", ")?;
                    }
                    write!(self.f, "{}", t)?;
                }
                write!(self.f, ">(")?;
                for (i, range) in bounds.iter().enumerate() {
                    if i > 0 {
                        write!(self.f, ", ")?;
                    }
                    write!(self.f, "[{}, {}]", range.min, range.extent)?;
                }
                writeln!(self.f, ") if {} {{", condition)?;
                self.nested(body)?;
                self.line_start()?;
                writeln!(self.f, "}}")
            }
            StmtKind::Block { first, rest } => {
                self.print(first)?;
                self.print(rest)
            }
            StmtKind::IfThenElse {
                condition,
                then_case,
                else_case,
            } => {
                self.line_start()?;
                writeln!(self.f, "if ({}) {{", condition)?;
                self.nested(then_case)?;
                if else_case.defined() {
                    self.line_start()?;
                    writeln!(self.f, "}} else {{")?;
                    self.nested(else_case)?;
                }
                self.line_start()?;
                writeln!(self.f, "}}")
            }
            StmtKind::Evaluate { value } => {
                self.line_start()?;
                writeln!(self.f, "{}", value)
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        StmtPrinter { f, indent: 0 }.print(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_expr_rendering() {
        let x = Expr::var(Type::int(32), "x");
        let e = x.clone() * Expr::int(2) + Expr::int(1);
        assert_eq!(e.to_string(), "((x * 2) + 1)");
        assert_eq!(
            Expr::ramp(x.clone(), Expr::int(1), 4).to_string(),
            "ramp(x, 1, 4)"
        );
        assert_eq!(Expr::broadcast(x.clone(), 4).to_string(), "x4(x)");
        assert_eq!(
            Expr::cast(Type::float(32), x.clone()).to_string(),
            "f32(x)"
        );
    }

    #[test]
    fn test_stmt_rendering() {
        let x = Expr::var(Type::int(32), "x");
        let body = Stmt::store("f", x.clone() + Expr::int(1), x.clone());
        let loop_ = Stmt::for_loop("x", Expr::int(0), Expr::int(8), ForType::Serial, body);
        let produce = Stmt::pipeline("f", loop_, Stmt::undefined(), Stmt::evaluate(Expr::int(0)));
        let rendered = produce.to_string();
        let expected = "\
produce f {
  for (x, 0, 8) {
    f[x] = (x + 1)
  }
} consume f {
  0
}
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_rendering_is_stable() {
        let x = Expr::var(Type::int(32), "x");
        let s = Stmt::store("f", x.clone(), x.clone());
        assert_eq!(s.to_string(), s.to_string());
    }
}
