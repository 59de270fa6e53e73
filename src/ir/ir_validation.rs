//! IR Validation
//!
//! Always-on structural validation for modules entering and leaving the
//! fusion pass. This enforces the IR contract so the pass can treat any
//! violation it finds later as its own bug rather than bad input.

use crate::ir::ir_display::IrLocation;
use crate::ir::ir_nodes::{
    BinOp, FunctionId, IrBody, IrExpression, IrFunction, IrModule, IrOperand, IrStatement,
    IrStatementKind, IrTerminator, IrType, LocalId, UnaryOp,
};
use crate::messages::errors::FusionError;
use crate::return_ir_error;
use crate::string_interning::StringTable;
use rustc_hash::FxHashSet;

pub fn validate_module(module: &IrModule, string_table: &StringTable) -> Result<(), FusionError> {
    let validator = IrValidator {
        module,
        string_table,
    };
    validator.validate()
}

struct IrValidator<'a> {
    module: &'a IrModule,
    string_table: &'a StringTable,
}

impl<'a> IrValidator<'a> {
    fn validate(&self) -> Result<(), FusionError> {
        self.validate_arena_and_order()?;

        for function in &self.module.functions {
            self.validate_function(function)?;
        }

        Ok(())
    }

    fn validate_arena_and_order(&self) -> Result<(), FusionError> {
        for (index, function) in self.module.functions.iter().enumerate() {
            if function.id.0 as usize != index {
                return_ir_error!(
                    format!(
                        "Function arena slot {} holds id {:?}",
                        index, function.id
                    ),
                    IrLocation::Function(function.id)
                );
            }

            if self.string_table.try_resolve(function.name).is_none() {
                return_ir_error!(
                    format!("Function {:?} has an unresolvable name id", function.id),
                    IrLocation::Function(function.id)
                );
            }
        }

        if self.module.order.len() != self.module.functions.len() {
            return_ir_error!(
                format!(
                    "Module order lists {} functions but the arena holds {}",
                    self.module.order.len(),
                    self.module.functions.len()
                ),
                IrLocation::Module
            );
        }

        let mut seen: FxHashSet<FunctionId> = FxHashSet::default();
        for &id in &self.module.order {
            if id.0 as usize >= self.module.functions.len() {
                return_ir_error!(
                    format!("Module order references unknown function {:?}", id),
                    IrLocation::Module
                );
            }

            if !seen.insert(id) {
                return_ir_error!(
                    format!("Function {:?} appears twice in the module order", id),
                    IrLocation::Module
                );
            }
        }

        Ok(())
    }

    fn validate_function(&self, function: &IrFunction) -> Result<(), FusionError> {
        let Some(body) = &function.body else {
            return Ok(());
        };

        let param_count = function.signature.params.len();
        if body.locals.len() < param_count {
            return_ir_error!(
                format!(
                    "Function {:?} declares {} params but only {} locals",
                    function.id,
                    param_count,
                    body.locals.len()
                ),
                IrLocation::Function(function.id)
            );
        }

        for (index, param_type) in function.signature.params.iter().enumerate() {
            if body.locals[index].ty != *param_type {
                return_ir_error!(
                    format!(
                        "Function {:?} param {} local type {:?} does not match signature type {:?}",
                        function.id, index, body.locals[index].ty, param_type
                    ),
                    IrLocation::Function(function.id)
                );
            }
        }

        for local in &body.locals {
            if local.ty == IrType::Unit {
                return_ir_error!(
                    format!("Function {:?} has a Unit-typed local", function.id),
                    IrLocation::Function(function.id)
                );
            }

            if self.string_table.try_resolve(local.name).is_none() {
                return_ir_error!(
                    format!("Function {:?} has a local with an unresolvable name", function.id),
                    IrLocation::Function(function.id)
                );
            }
        }

        if body.blocks.is_empty() {
            return_ir_error!(
                format!("Function {:?} has a body with no blocks", function.id),
                IrLocation::Function(function.id)
            );
        }

        let mut statement_ids: FxHashSet<u32> = FxHashSet::default();
        for (index, block) in body.blocks.iter().enumerate() {
            if block.id.0 as usize != index {
                return_ir_error!(
                    format!(
                        "Function {:?} block slot {} holds id {:?}",
                        function.id, index, block.id
                    ),
                    IrLocation::Block(function.id, block.id)
                );
            }

            for statement in &block.statements {
                if statement.id.0 >= body.next_statement_id {
                    return_ir_error!(
                        format!(
                            "Function {:?} statement {:?} is past the id counter",
                            function.id, statement.id
                        ),
                        IrLocation::Statement(function.id, statement.id)
                    );
                }

                if !statement_ids.insert(statement.id.0) {
                    return_ir_error!(
                        format!(
                            "Function {:?} reuses statement id {:?}",
                            function.id, statement.id
                        ),
                        IrLocation::Statement(function.id, statement.id)
                    );
                }

                self.validate_statement(function, body, statement)?;
            }

            self.validate_terminator(function, body, &block.terminator)?;
        }

        Ok(())
    }

    fn validate_statement(
        &self,
        function: &IrFunction,
        body: &IrBody,
        statement: &IrStatement,
    ) -> Result<(), FusionError> {
        let location = IrLocation::Statement(function.id, statement.id);

        match &statement.kind {
            IrStatementKind::Assign { target, value } => {
                let target_type = self.local_type(function, body, *target, &location)?;
                let value_type = self.expression_type(function, body, value, &location)?;

                if target_type != value_type {
                    return_ir_error!(
                        format!(
                            "Assign of {:?} value into {:?} local in function {:?}",
                            value_type, target_type, function.id
                        ),
                        IrLocation::Statement(function.id, statement.id)
                    );
                }
            }

            IrStatementKind::Call {
                target,
                args,
                result,
            } => {
                if target.0 as usize >= self.module.functions.len() {
                    return_ir_error!(
                        format!("Call to unknown function {:?}", target),
                        IrLocation::Statement(function.id, statement.id)
                    );
                }

                let callee = self.module.function(*target);
                let fixed = callee.signature.params.len();

                let arity_ok = if callee.signature.is_varargs {
                    args.len() >= fixed
                } else {
                    args.len() == fixed
                };

                if !arity_ok {
                    return_ir_error!(
                        format!(
                            "Call to {:?} passes {} args but the signature takes {}",
                            target,
                            args.len(),
                            fixed
                        ),
                        IrLocation::Statement(function.id, statement.id)
                    );
                }

                for (index, arg) in args.iter().take(fixed).enumerate() {
                    let arg_type = self.operand_type(function, body, arg, &location)?;
                    if arg_type != callee.signature.params[index] {
                        return_ir_error!(
                            format!(
                                "Call to {:?} arg {} is {:?}, expected {:?}",
                                target, index, arg_type, callee.signature.params[index]
                            ),
                            IrLocation::Statement(function.id, statement.id)
                        );
                    }
                }

                match result {
                    Some(result) => {
                        if callee.signature.return_type == IrType::Unit {
                            return_ir_error!(
                                format!("Call to Unit function {:?} binds a result", target),
                                IrLocation::Statement(function.id, statement.id)
                            );
                        }

                        let result_type = self.local_type(function, body, *result, &location)?;
                        if result_type != callee.signature.return_type {
                            return_ir_error!(
                                format!(
                                    "Call to {:?} binds {:?} result into {:?} local",
                                    target, callee.signature.return_type, result_type
                                ),
                                IrLocation::Statement(function.id, statement.id)
                            );
                        }
                    }

                    // Discarding a non-Unit result is allowed
                    None => {}
                }
            }
        }

        Ok(())
    }

    fn validate_terminator(
        &self,
        function: &IrFunction,
        body: &IrBody,
        terminator: &IrTerminator,
    ) -> Result<(), FusionError> {
        let location = IrLocation::Function(function.id);

        match terminator {
            IrTerminator::Jump { target } => {
                self.check_block_target(function, body, *target)?;
            }

            IrTerminator::If {
                condition,
                then_block,
                else_block,
            } => {
                self.check_block_target(function, body, *then_block)?;
                self.check_block_target(function, body, *else_block)?;

                let condition_type = self.operand_type(function, body, condition, &location)?;
                if condition_type != IrType::Bool {
                    return_ir_error!(
                        format!(
                            "Branch condition in function {:?} is {:?}, expected Bool",
                            function.id, condition_type
                        ),
                        IrLocation::Function(function.id)
                    );
                }
            }

            IrTerminator::Return(value) => match (value, function.signature.return_type) {
                (None, IrType::Unit) => {}
                (None, other) => {
                    return_ir_error!(
                        format!(
                            "Function {:?} returns nothing but its signature returns {:?}",
                            function.id, other
                        ),
                        IrLocation::Function(function.id)
                    );
                }
                (Some(_), IrType::Unit) => {
                    return_ir_error!(
                        format!("Unit function {:?} returns a value", function.id),
                        IrLocation::Function(function.id)
                    );
                }
                (Some(operand), expected) => {
                    let actual = self.operand_type(function, body, operand, &location)?;
                    if actual != expected {
                        return_ir_error!(
                            format!(
                                "Function {:?} returns {:?} but its signature returns {:?}",
                                function.id, actual, expected
                            ),
                            IrLocation::Function(function.id)
                        );
                    }
                }
            },
        }

        Ok(())
    }

    fn check_block_target(
        &self,
        function: &IrFunction,
        body: &IrBody,
        target: crate::ir::ir_nodes::BlockId,
    ) -> Result<(), FusionError> {
        if target.0 as usize >= body.blocks.len() {
            return_ir_error!(
                format!(
                    "Function {:?} jumps to unknown block {:?}",
                    function.id, target
                ),
                IrLocation::Block(function.id, target)
            );
        }

        Ok(())
    }

    fn local_type(
        &self,
        function: &IrFunction,
        body: &IrBody,
        local: LocalId,
        location: &IrLocation,
    ) -> Result<IrType, FusionError> {
        if local.0 as usize >= body.locals.len() {
            return_ir_error!(
                format!(
                    "Function {:?} references unknown local {:?} ({:?})",
                    function.id, local, location
                ),
                IrLocation::Function(function.id)
            );
        }

        Ok(body.local_type(local))
    }

    fn operand_type(
        &self,
        function: &IrFunction,
        body: &IrBody,
        operand: &IrOperand,
        location: &IrLocation,
    ) -> Result<IrType, FusionError> {
        match operand {
            IrOperand::Local(id) => self.local_type(function, body, *id, location),
            IrOperand::Int(_) => Ok(IrType::Int),
            IrOperand::Float(_) => Ok(IrType::Float),
            IrOperand::Bool(_) => Ok(IrType::Bool),
        }
    }

    fn expression_type(
        &self,
        function: &IrFunction,
        body: &IrBody,
        expression: &IrExpression,
        location: &IrLocation,
    ) -> Result<IrType, FusionError> {
        match expression {
            IrExpression::Operand(operand) => {
                self.operand_type(function, body, operand, location)
            }

            IrExpression::BinOp { left, op, right } => {
                let left_type = self.operand_type(function, body, left, location)?;
                let right_type = self.operand_type(function, body, right, location)?;

                if left_type != right_type {
                    return_ir_error!(
                        format!(
                            "Mixed operand types {:?} and {:?} for {:?} in function {:?}",
                            left_type, right_type, op, function.id
                        ),
                        IrLocation::Function(function.id)
                    );
                }

                match op {
                    BinOp::And | BinOp::Or => {
                        if left_type != IrType::Bool {
                            return_ir_error!(
                                format!(
                                    "{:?} needs Bool operands, got {:?}, in function {:?}",
                                    op, left_type, function.id
                                ),
                                IrLocation::Function(function.id)
                            );
                        }
                        Ok(IrType::Bool)
                    }

                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                        if left_type != IrType::Int && left_type != IrType::Float {
                            return_ir_error!(
                                format!(
                                    "{:?} needs numeric operands, got {:?}, in function {:?}",
                                    op, left_type, function.id
                                ),
                                IrLocation::Function(function.id)
                            );
                        }
                        Ok(IrType::Bool)
                    }

                    BinOp::Eq | BinOp::Ne => Ok(IrType::Bool),

                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                        if left_type != IrType::Int && left_type != IrType::Float {
                            return_ir_error!(
                                format!(
                                    "{:?} needs numeric operands, got {:?}, in function {:?}",
                                    op, left_type, function.id
                                ),
                                IrLocation::Function(function.id)
                            );
                        }
                        Ok(left_type)
                    }
                }
            }

            IrExpression::UnaryOp { op, operand } => {
                let operand_type = self.operand_type(function, body, operand, location)?;

                match op {
                    UnaryOp::Neg => {
                        if operand_type != IrType::Int && operand_type != IrType::Float {
                            return_ir_error!(
                                format!(
                                    "Neg needs a numeric operand, got {:?}, in function {:?}",
                                    operand_type, function.id
                                ),
                                IrLocation::Function(function.id)
                            );
                        }
                        Ok(operand_type)
                    }
                    UnaryOp::Not => {
                        if operand_type != IrType::Bool {
                            return_ir_error!(
                                format!(
                                    "Not needs a Bool operand, got {:?}, in function {:?}",
                                    operand_type, function.id
                                ),
                                IrLocation::Function(function.id)
                            );
                        }
                        Ok(IrType::Bool)
                    }
                }
            }
        }
    }
}
