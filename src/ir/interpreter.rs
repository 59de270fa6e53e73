//! A direct evaluator for IR modules.
//!
//! This exists for the CLI `eval` command and for tests that check the
//! fused module computes the same results as the original. It is not a
//! performance path; a step limit keeps looping modules from hanging.

use crate::ir::ir_display::IrLocation;
use crate::ir::ir_nodes::{
    BinOp, FunctionId, IrBody, IrExpression, IrModule, IrOperand, IrStatementKind, IrTerminator,
    IrType, UnaryOp,
};
use crate::messages::errors::FusionError;
use crate::return_ir_error;
use crate::settings::INTERPRETER_STEP_LIMIT;
use crate::string_interning::StringTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl IrValue {
    pub fn ty(&self) -> IrType {
        match self {
            IrValue::Int(_) => IrType::Int,
            IrValue::Float(_) => IrType::Float,
            IrValue::Bool(_) => IrType::Bool,
        }
    }
}

pub struct Interpreter<'a> {
    module: &'a IrModule,
    string_table: &'a StringTable,
    steps_remaining: u64,
}

impl<'a> Interpreter<'a> {
    pub fn new(module: &'a IrModule, string_table: &'a StringTable) -> Self {
        Self::with_step_limit(module, string_table, INTERPRETER_STEP_LIMIT)
    }

    pub fn with_step_limit(
        module: &'a IrModule,
        string_table: &'a StringTable,
        step_limit: u64,
    ) -> Self {
        Interpreter {
            module,
            string_table,
            steps_remaining: step_limit,
        }
    }

    /// Evaluate a function by name. Returns None for Unit functions.
    pub fn call_by_name(
        &mut self,
        name: &str,
        args: &[IrValue],
    ) -> Result<Option<IrValue>, FusionError> {
        let Some(name_id) = self.string_table.get_existing(name) else {
            return_ir_error!(
                format!("No function named '{name}' in this module"),
                IrLocation::Module
            );
        };

        let Some(function) = self.module.functions.iter().find(|f| f.name == name_id) else {
            return_ir_error!(
                format!("No function named '{name}' in this module"),
                IrLocation::Module
            );
        };

        if args.len() != function.signature.params.len() {
            return_ir_error!(
                format!(
                    "'{}' takes {} arguments, got {}",
                    name,
                    function.signature.params.len(),
                    args.len()
                ),
                IrLocation::Function(function.id)
            );
        }

        for (index, (arg, expected)) in
            args.iter().zip(&function.signature.params).enumerate()
        {
            if arg.ty() != *expected {
                return_ir_error!(
                    format!(
                        "Argument {} to '{}' is {:?}, expected {:?}",
                        index,
                        name,
                        arg.ty(),
                        expected
                    ),
                    IrLocation::Function(function.id)
                );
            }
        }

        self.call_function(function.id, args)
    }

    pub fn call_function(
        &mut self,
        id: FunctionId,
        args: &[IrValue],
    ) -> Result<Option<IrValue>, FusionError> {
        let module = self.module;
        let function = module.function(id);

        let Some(body) = &function.body else {
            return_ir_error!(
                format!(
                    "Cannot evaluate external function '{}'",
                    self.string_table.resolve(function.name)
                ),
                IrLocation::Function(id)
            );
        };

        let mut locals: Vec<Option<IrValue>> = vec![None; body.locals.len()];
        for (index, arg) in args.iter().enumerate() {
            locals[index] = Some(*arg);
        }

        let mut current = 0usize;
        loop {
            let block = &body.blocks[current];

            for statement in &block.statements {
                self.step(id)?;

                match &statement.kind {
                    IrStatementKind::Assign { target, value } => {
                        let value = self.eval_expression(id, body, &locals, value)?;
                        locals[target.0 as usize] = Some(value);
                    }

                    IrStatementKind::Call {
                        target,
                        args,
                        result,
                    } => {
                        let mut arg_values = Vec::with_capacity(args.len());
                        for arg in args {
                            arg_values.push(self.eval_operand(id, body, &locals, arg)?);
                        }

                        let returned = self.call_function(*target, &arg_values)?;

                        if let Some(result) = result {
                            match returned {
                                Some(value) => locals[result.0 as usize] = Some(value),
                                None => return_ir_error!(
                                    format!(
                                        "Call to {:?} bound a result but nothing was returned",
                                        target
                                    ),
                                    IrLocation::Statement(id, statement.id)
                                ),
                            }
                        }
                    }
                }
            }

            self.step(id)?;

            match &block.terminator {
                IrTerminator::Jump { target } => current = target.0 as usize,

                IrTerminator::If {
                    condition,
                    then_block,
                    else_block,
                } => {
                    let condition = self.eval_operand(id, body, &locals, condition)?;
                    match condition {
                        IrValue::Bool(true) => current = then_block.0 as usize,
                        IrValue::Bool(false) => current = else_block.0 as usize,
                        other => return_ir_error!(
                            format!("Branch condition evaluated to {:?}", other),
                            IrLocation::Function(id)
                        ),
                    }
                }

                IrTerminator::Return(None) => return Ok(None),
                IrTerminator::Return(Some(operand)) => {
                    return Ok(Some(self.eval_operand(id, body, &locals, operand)?));
                }
            }
        }
    }

    fn step(&mut self, function: FunctionId) -> Result<(), FusionError> {
        if self.steps_remaining == 0 {
            return_ir_error!(
                "Evaluation step limit exceeded (module may not terminate)".to_string(),
                IrLocation::Function(function)
            );
        }

        self.steps_remaining -= 1;
        Ok(())
    }

    fn eval_operand(
        &self,
        function: FunctionId,
        body: &IrBody,
        locals: &[Option<IrValue>],
        operand: &IrOperand,
    ) -> Result<IrValue, FusionError> {
        match operand {
            IrOperand::Local(local) => match locals[local.0 as usize] {
                Some(value) => Ok(value),
                None => Err(FusionError::ir_error(
                    format!(
                        "Read of uninitialized local '{}'",
                        self.string_table.resolve(body.locals[local.0 as usize].name)
                    ),
                    IrLocation::Function(function),
                )),
            },
            IrOperand::Int(v) => Ok(IrValue::Int(*v)),
            IrOperand::Float(v) => Ok(IrValue::Float(*v)),
            IrOperand::Bool(v) => Ok(IrValue::Bool(*v)),
        }
    }

    fn eval_expression(
        &self,
        function: FunctionId,
        body: &IrBody,
        locals: &[Option<IrValue>],
        expression: &IrExpression,
    ) -> Result<IrValue, FusionError> {
        match expression {
            IrExpression::Operand(operand) => self.eval_operand(function, body, locals, operand),

            IrExpression::BinOp { left, op, right } => {
                let left = self.eval_operand(function, body, locals, left)?;
                let right = self.eval_operand(function, body, locals, right)?;
                self.eval_bin_op(function, left, *op, right)
            }

            IrExpression::UnaryOp { op, operand } => {
                let operand = self.eval_operand(function, body, locals, operand)?;

                match (op, operand) {
                    (UnaryOp::Neg, IrValue::Int(v)) => Ok(IrValue::Int(-v)),
                    (UnaryOp::Neg, IrValue::Float(v)) => Ok(IrValue::Float(-v)),
                    (UnaryOp::Not, IrValue::Bool(v)) => Ok(IrValue::Bool(!v)),
                    (op, operand) => Err(FusionError::compiler_error(format!(
                        "Validator let through {:?} on {:?}",
                        op, operand
                    ))),
                }
            }
        }
    }

    fn eval_bin_op(
        &self,
        function: FunctionId,
        left: IrValue,
        op: BinOp,
        right: IrValue,
    ) -> Result<IrValue, FusionError> {
        use IrValue::*;

        let value = match (left, op, right) {
            (Int(a), BinOp::Add, Int(b)) => Int(a.wrapping_add(b)),
            (Int(a), BinOp::Sub, Int(b)) => Int(a.wrapping_sub(b)),
            (Int(a), BinOp::Mul, Int(b)) => Int(a.wrapping_mul(b)),
            (Int(a), BinOp::Div, Int(b)) => {
                if b == 0 {
                    return_ir_error!("Division by zero".to_string(), IrLocation::Function(function));
                }
                Int(a.wrapping_div(b))
            }
            (Int(a), BinOp::Mod, Int(b)) => {
                if b == 0 {
                    return_ir_error!("Modulo by zero".to_string(), IrLocation::Function(function));
                }
                Int(a.wrapping_rem(b))
            }
            (Int(a), BinOp::Eq, Int(b)) => Bool(a == b),
            (Int(a), BinOp::Ne, Int(b)) => Bool(a != b),
            (Int(a), BinOp::Lt, Int(b)) => Bool(a < b),
            (Int(a), BinOp::Le, Int(b)) => Bool(a <= b),
            (Int(a), BinOp::Gt, Int(b)) => Bool(a > b),
            (Int(a), BinOp::Ge, Int(b)) => Bool(a >= b),

            (Float(a), BinOp::Add, Float(b)) => Float(a + b),
            (Float(a), BinOp::Sub, Float(b)) => Float(a - b),
            (Float(a), BinOp::Mul, Float(b)) => Float(a * b),
            (Float(a), BinOp::Div, Float(b)) => Float(a / b),
            (Float(a), BinOp::Mod, Float(b)) => Float(a % b),
            (Float(a), BinOp::Eq, Float(b)) => Bool(a == b),
            (Float(a), BinOp::Ne, Float(b)) => Bool(a != b),
            (Float(a), BinOp::Lt, Float(b)) => Bool(a < b),
            (Float(a), BinOp::Le, Float(b)) => Bool(a <= b),
            (Float(a), BinOp::Gt, Float(b)) => Bool(a > b),
            (Float(a), BinOp::Ge, Float(b)) => Bool(a >= b),

            (Bool(a), BinOp::And, Bool(b)) => Bool(a && b),
            (Bool(a), BinOp::Or, Bool(b)) => Bool(a || b),
            (Bool(a), BinOp::Eq, Bool(b)) => Bool(a == b),
            (Bool(a), BinOp::Ne, Bool(b)) => Bool(a != b),

            (left, op, right) => {
                return Err(FusionError::compiler_error(format!(
                    "Validator let through {:?} {:?} {:?}",
                    left, op, right
                )));
            }
        };

        Ok(value)
    }
}
