//! Human-readable dumps of IR modules, used by the CLI `show` command and
//! the `ir_log!` dev output. Never parsed back; the JSON form is the real
//! interchange format.

use crate::ir::ir_nodes::{
    BinOp, BlockId, FunctionId, IrBody, IrExpression, IrFunction, IrModule, IrOperand, IrStatement,
    IrStatementKind, IrTerminator, IrType, Linkage, StatementId, UnaryOp,
};
use crate::string_interning::StringTable;
use std::fmt::Write;

/// Where in a module an error or log line points, since the IR has no
/// source text to reference.
#[derive(Debug)]
pub enum IrLocation {
    Module,
    Function(FunctionId),
    Block(FunctionId, BlockId),
    Statement(FunctionId, StatementId),
    File(std::path::PathBuf),
}

pub fn display_module(module: &IrModule, string_table: &StringTable) -> String {
    let mut out = String::new();

    for function in module.ordered_functions() {
        display_function(function, string_table, &mut out);
        out.push('\n');
    }

    out
}

pub fn display_function(function: &IrFunction, string_table: &StringTable, out: &mut String) {
    let linkage = match function.linkage {
        Linkage::Internal => "internal ",
        Linkage::External => "",
    };

    let _ = write!(
        out,
        "{}fn {}(",
        linkage,
        string_table.resolve(function.name)
    );

    for (index, param) in function.signature.params.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }

        match &function.body {
            Some(body) => {
                let _ = write!(
                    out,
                    "{}: {}",
                    string_table.resolve(body.locals[index].name),
                    type_name(*param)
                );
            }
            None => {
                let _ = write!(out, "{}", type_name(*param));
            }
        }
    }

    if function.signature.is_varargs {
        out.push_str(", ...");
    }

    let _ = write!(out, ") -> {}", type_name(function.signature.return_type));

    match &function.body {
        None => out.push_str(" (declaration)\n"),
        Some(body) => {
            out.push('\n');
            display_body(body, string_table, out);
        }
    }
}

fn display_body(body: &IrBody, string_table: &StringTable, out: &mut String) {
    for block in &body.blocks {
        let _ = writeln!(out, "  b{}:", block.id.0);

        for statement in &block.statements {
            display_statement(statement, body, string_table, out);
        }

        display_terminator(&block.terminator, body, string_table, out);
    }
}

fn display_statement(
    statement: &IrStatement,
    body: &IrBody,
    string_table: &StringTable,
    out: &mut String,
) {
    match &statement.kind {
        IrStatementKind::Assign { target, value } => {
            let _ = writeln!(
                out,
                "    s{}: {} = {}",
                statement.id.0,
                local_name(*target, body, string_table),
                expression_text(value, body, string_table),
            );
        }

        IrStatementKind::Call {
            target,
            args,
            result,
        } => {
            let args_text = args
                .iter()
                .map(|arg| operand_text(arg, body, string_table))
                .collect::<Vec<_>>()
                .join(", ");

            match result {
                Some(result) => {
                    let _ = writeln!(
                        out,
                        "    s{}: {} = call #{}({})",
                        statement.id.0,
                        local_name(*result, body, string_table),
                        target.0,
                        args_text,
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "    s{}: call #{}({})",
                        statement.id.0, target.0, args_text,
                    );
                }
            }
        }
    }
}

fn display_terminator(
    terminator: &IrTerminator,
    body: &IrBody,
    string_table: &StringTable,
    out: &mut String,
) {
    match terminator {
        IrTerminator::Jump { target } => {
            let _ = writeln!(out, "    jump b{}", target.0);
        }
        IrTerminator::If {
            condition,
            then_block,
            else_block,
        } => {
            let _ = writeln!(
                out,
                "    if {} then b{} else b{}",
                operand_text(condition, body, string_table),
                then_block.0,
                else_block.0,
            );
        }
        IrTerminator::Return(None) => {
            let _ = writeln!(out, "    return");
        }
        IrTerminator::Return(Some(operand)) => {
            let _ = writeln!(out, "    return {}", operand_text(operand, body, string_table));
        }
    }
}

fn expression_text(expression: &IrExpression, body: &IrBody, string_table: &StringTable) -> String {
    match expression {
        IrExpression::Operand(operand) => operand_text(operand, body, string_table),
        IrExpression::BinOp { left, op, right } => format!(
            "{} {} {}",
            operand_text(left, body, string_table),
            bin_op_text(*op),
            operand_text(right, body, string_table),
        ),
        IrExpression::UnaryOp { op, operand } => format!(
            "{}{}",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "not ",
            },
            operand_text(operand, body, string_table),
        ),
    }
}

fn operand_text(operand: &IrOperand, body: &IrBody, string_table: &StringTable) -> String {
    match operand {
        IrOperand::Local(id) => local_name(*id, body, string_table).to_string(),
        IrOperand::Int(v) => v.to_string(),
        IrOperand::Float(v) => v.to_string(),
        IrOperand::Bool(v) => v.to_string(),
    }
}

fn local_name<'a>(
    id: crate::ir::ir_nodes::LocalId,
    body: &'a IrBody,
    string_table: &'a StringTable,
) -> &'a str {
    string_table.resolve(body.locals[id.0 as usize].name)
}

fn type_name(ty: IrType) -> &'static str {
    match ty {
        IrType::Int => "Int",
        IrType::Float => "Float",
        IrType::Bool => "Bool",
        IrType::Unit => "Unit",
    }
}

fn bin_op_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}
