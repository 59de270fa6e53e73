//! In-place call inlining.
//!
//! `inline_call` replaces one call statement with a copy of the callee's
//! body: callee locals are appended to the caller (parameters become
//! ordinary locals bound to the argument operands), callee blocks are
//! cloned with remapped IDs, and every cloned return becomes a jump into a
//! continuation block holding the statements that followed the call. The
//! two inlined bodies of a fused function therefore stay fully isolated
//! from each other: nothing is substituted, only remapped.

use crate::ir::ir_display::IrLocation;
use crate::ir::ir_nodes::{
    BlockId, FunctionId, IrBlock, IrExpression, IrModule, IrOperand, IrStatement, IrStatementKind,
    IrTerminator, LocalId, StatementId,
};
use crate::messages::errors::FusionError;
use crate::{return_compiler_error, return_inline_error};

/// Whether a callee's body can be legalized into a caller at all.
/// Declarations have no body to copy; variadic callees have no fixed
/// parameter list to bind.
pub(crate) fn can_inline(module: &IrModule, callee: FunctionId) -> bool {
    let function = module.function(callee);
    !function.is_declaration() && !function.signature.is_varargs
}

/// Inline the call statement `call_site` inside `caller`.
///
/// The caller keeps its block IDs: the calling block is split in place,
/// with trailing statements and the original terminator moving to a fresh
/// continuation block at the end of the block list.
pub(crate) fn inline_call(
    module: &mut IrModule,
    caller: FunctionId,
    call_site: StatementId,
) -> Result<(), FusionError> {
    // Pull everything we need out of the call before mutating anything
    let (block_index, statement_index, callee_id, args, result) = {
        let Some(body) = &module.function(caller).body else {
            return_compiler_error!(
                format!("Inline requested inside bodiless function {:?}", caller),
                IrLocation::Function(caller)
            );
        };

        let Some((block_index, statement_index)) = body.find_statement(call_site) else {
            return_compiler_error!(
                format!("Inline requested for missing statement {:?}", call_site),
                IrLocation::Statement(caller, call_site)
            );
        };

        let statement = &body.blocks[block_index].statements[statement_index];
        let IrStatementKind::Call {
            target,
            args,
            result,
        } = &statement.kind
        else {
            return_compiler_error!(
                format!("Inline requested for non-call statement {:?}", call_site),
                IrLocation::Statement(caller, call_site)
            );
        };

        (block_index, statement_index, *target, args.clone(), *result)
    };

    if callee_id == caller {
        return_inline_error!(
            "Cannot inline a directly recursive call".to_string(),
            IrLocation::Statement(caller, call_site)
        );
    }

    let callee = module.function(callee_id);

    if callee.signature.is_varargs {
        return_inline_error!(
            "Cannot inline a variadic callee".to_string(),
            IrLocation::Statement(caller, call_site)
        );
    }

    let Some(callee_body) = callee.body.clone() else {
        return_inline_error!(
            "Cannot inline a declaration".to_string(),
            IrLocation::Statement(caller, call_site)
        );
    };

    if args.len() != callee.signature.params.len() {
        return_compiler_error!(
            format!(
                "Inline of {:?} with {} args against {} params",
                callee_id,
                args.len(),
                callee.signature.params.len()
            ),
            IrLocation::Statement(caller, call_site)
        );
    }

    let Some(body) = module.function_mut(caller).body.as_mut() else {
        return_compiler_error!(
            format!("Caller {:?} body vanished during inline", caller),
            IrLocation::Function(caller)
        );
    };

    // Callee local i lives at local_offset + i, callee block j at
    // block_offset + j, and the continuation block right after those.
    let local_offset = body.locals.len() as u32;
    let block_offset = body.blocks.len() as u32;
    let continuation = BlockId(block_offset + callee_body.blocks.len() as u32);

    body.locals.extend(callee_body.locals.iter().cloned());

    // Split the calling block: everything after the call moves to the
    // continuation, the call itself is dropped, and the block now jumps
    // into the inlined entry.
    let calling_block = &mut body.blocks[block_index];
    let trailing = calling_block.statements.split_off(statement_index + 1);
    calling_block.statements.pop();
    let continuation_terminator = std::mem::replace(
        &mut calling_block.terminator,
        IrTerminator::Jump {
            target: BlockId(block_offset),
        },
    );

    // Bind each argument to its remapped parameter local
    for (index, arg) in args.iter().enumerate() {
        let id = body.new_statement_id();
        body.blocks[block_index].statements.push(IrStatement {
            id,
            kind: IrStatementKind::Assign {
                target: LocalId(local_offset + index as u32),
                value: IrExpression::Operand(*arg),
            },
        });
    }

    for callee_block in &callee_body.blocks {
        let mut statements = Vec::with_capacity(callee_block.statements.len());
        for statement in &callee_block.statements {
            let id = body.new_statement_id();
            statements.push(IrStatement {
                id,
                kind: remap_statement_kind(&statement.kind, local_offset),
            });
        }

        let terminator = match &callee_block.terminator {
            IrTerminator::Jump { target } => IrTerminator::Jump {
                target: BlockId(block_offset + target.0),
            },

            IrTerminator::If {
                condition,
                then_block,
                else_block,
            } => IrTerminator::If {
                condition: remap_operand(condition, local_offset),
                then_block: BlockId(block_offset + then_block.0),
                else_block: BlockId(block_offset + else_block.0),
            },

            IrTerminator::Return(value) => {
                match (result, value) {
                    (Some(result_local), Some(value)) => {
                        let id = body.new_statement_id();
                        statements.push(IrStatement {
                            id,
                            kind: IrStatementKind::Assign {
                                target: result_local,
                                value: IrExpression::Operand(remap_operand(value, local_offset)),
                            },
                        });
                    }

                    (Some(_), None) => {
                        return_compiler_error!(
                            format!(
                                "Call to {:?} binds a result but the callee returns nothing",
                                callee_id
                            ),
                            IrLocation::Statement(caller, call_site)
                        );
                    }

                    // Discarded or Unit result: nothing to carry over
                    (None, _) => {}
                }

                IrTerminator::Jump {
                    target: continuation,
                }
            }
        };

        body.blocks.push(IrBlock {
            id: BlockId(block_offset + callee_block.id.0),
            statements,
            terminator,
        });
    }

    body.blocks.push(IrBlock {
        id: continuation,
        statements: trailing,
        terminator: continuation_terminator,
    });

    Ok(())
}

fn remap_operand(operand: &IrOperand, local_offset: u32) -> IrOperand {
    match operand {
        IrOperand::Local(id) => IrOperand::Local(LocalId(local_offset + id.0)),
        other => *other,
    }
}

fn remap_expression(expression: &IrExpression, local_offset: u32) -> IrExpression {
    match expression {
        IrExpression::Operand(operand) => {
            IrExpression::Operand(remap_operand(operand, local_offset))
        }

        IrExpression::BinOp { left, op, right } => IrExpression::BinOp {
            left: remap_operand(left, local_offset),
            op: *op,
            right: remap_operand(right, local_offset),
        },

        IrExpression::UnaryOp { op, operand } => IrExpression::UnaryOp {
            op: *op,
            operand: remap_operand(operand, local_offset),
        },
    }
}

fn remap_statement_kind(kind: &IrStatementKind, local_offset: u32) -> IrStatementKind {
    match kind {
        IrStatementKind::Assign { target, value } => IrStatementKind::Assign {
            target: LocalId(local_offset + target.0),
            value: remap_expression(value, local_offset),
        },

        IrStatementKind::Call {
            target,
            args,
            result,
        } => IrStatementKind::Call {
            // Callees are module-global, only the operands move
            target: *target,
            args: args.iter().map(|arg| remap_operand(arg, local_offset)).collect(),
            result: result.map(|local| LocalId(local_offset + local.0)),
        },
    }
}
