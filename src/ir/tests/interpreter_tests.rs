#![cfg(test)]

use crate::ir::interpreter::{Interpreter, IrValue};
use crate::ir::ir_builder::{FunctionBuilder, declare_function};
use crate::ir::ir_nodes::{BinOp, IrExpression, IrModule, IrOperand, IrType, UnaryOp};
use crate::messages::errors::ErrorType;
use crate::string_interning::StringTable;

#[test]
fn straight_line_arithmetic() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    // f(x) = -(x * 3) + 1
    let mut f = FunctionBuilder::new("f", &[("x", IrType::Int)], IrType::Int, &mut table);
    let tripled = f.new_local("tripled", IrType::Int);
    let negated = f.new_local("negated", IrType::Int);
    let out = f.new_local("out", IrType::Int);
    f.assign(
        tripled,
        IrExpression::BinOp {
            left: IrOperand::Local(f.param(0)),
            op: BinOp::Mul,
            right: IrOperand::Int(3),
        },
    );
    f.assign(
        negated,
        IrExpression::UnaryOp {
            op: UnaryOp::Neg,
            operand: IrOperand::Local(tripled),
        },
    );
    f.assign(
        out,
        IrExpression::BinOp {
            left: IrOperand::Local(negated),
            op: BinOp::Add,
            right: IrOperand::Int(1),
        },
    );
    f.ret(Some(IrOperand::Local(out)));
    f.finish(&mut module);

    let mut interpreter = Interpreter::new(&module, &table);
    assert_eq!(
        interpreter.call_by_name("f", &[IrValue::Int(4)]).unwrap(),
        Some(IrValue::Int(-11))
    );
}

#[test]
fn branches_take_the_right_path() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    // pick(c) = if c then 1 else 2
    let mut pick = FunctionBuilder::new("pick", &[("c", IrType::Bool)], IrType::Int, &mut table);
    let then_block = pick.new_block();
    let else_block = pick.new_block();
    pick.branch(IrOperand::Local(pick.param(0)), then_block, else_block);
    pick.switch_to(then_block);
    pick.ret(Some(IrOperand::Int(1)));
    pick.switch_to(else_block);
    pick.ret(Some(IrOperand::Int(2)));
    pick.finish(&mut module);

    let mut interpreter = Interpreter::new(&module, &table);
    assert_eq!(
        interpreter
            .call_by_name("pick", &[IrValue::Bool(true)])
            .unwrap(),
        Some(IrValue::Int(1))
    );
    assert_eq!(
        interpreter
            .call_by_name("pick", &[IrValue::Bool(false)])
            .unwrap(),
        Some(IrValue::Int(2))
    );
}

#[test]
fn calls_pass_arguments_and_results_through() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let mut inc = FunctionBuilder::new("inc", &[("x", IrType::Int)], IrType::Int, &mut table);
    let out = inc.new_local("out", IrType::Int);
    inc.assign(
        out,
        IrExpression::BinOp {
            left: IrOperand::Local(inc.param(0)),
            op: BinOp::Add,
            right: IrOperand::Int(1),
        },
    );
    inc.ret(Some(IrOperand::Local(out)));
    let inc = inc.finish(&mut module);

    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let a = main.new_local("a", IrType::Int);
    let b = main.new_local("b", IrType::Int);
    main.call(inc, vec![IrOperand::Int(40)], Some(a));
    main.call(inc, vec![IrOperand::Local(a)], Some(b));
    main.ret(Some(IrOperand::Local(b)));
    main.finish(&mut module);

    let mut interpreter = Interpreter::new(&module, &table);
    assert_eq!(
        interpreter.call_by_name("main", &[]).unwrap(),
        Some(IrValue::Int(42))
    );
}

#[test]
fn division_by_zero_is_an_error() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let mut f = FunctionBuilder::new("f", &[("x", IrType::Int)], IrType::Int, &mut table);
    let out = f.new_local("out", IrType::Int);
    f.assign(
        out,
        IrExpression::BinOp {
            left: IrOperand::Local(f.param(0)),
            op: BinOp::Div,
            right: IrOperand::Int(0),
        },
    );
    f.ret(Some(IrOperand::Local(out)));
    f.finish(&mut module);

    let mut interpreter = Interpreter::new(&module, &table);
    let error = interpreter
        .call_by_name("f", &[IrValue::Int(1)])
        .unwrap_err();
    assert_eq!(error.error_type, ErrorType::Ir);
}

#[test]
fn the_step_limit_stops_a_looping_module() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let mut spin = FunctionBuilder::new("spin", &[], IrType::Unit, &mut table);
    spin.jump(crate::ir::ir_nodes::BlockId(0));
    spin.finish(&mut module);

    let mut interpreter = Interpreter::with_step_limit(&module, &table, 1_000);
    let error = interpreter.call_by_name("spin", &[]).unwrap_err();
    assert_eq!(error.error_type, ErrorType::Ir);
}

#[test]
fn wrong_argument_counts_and_types_are_errors() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let mut f = FunctionBuilder::new("f", &[("x", IrType::Int)], IrType::Int, &mut table);
    let arg = IrOperand::Local(f.param(0));
    f.ret(Some(arg));
    f.finish(&mut module);

    let mut interpreter = Interpreter::new(&module, &table);
    assert!(interpreter.call_by_name("f", &[]).is_err());
    assert!(
        interpreter
            .call_by_name("f", &[IrValue::Bool(true)])
            .is_err()
    );
    assert!(interpreter.call_by_name("missing", &[]).is_err());
}

#[test]
fn external_functions_cannot_be_evaluated() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();
    declare_function(&mut module, "printf", &[IrType::Int], IrType::Unit, &mut table);

    let mut interpreter = Interpreter::new(&module, &table);
    let error = interpreter
        .call_by_name("printf", &[IrValue::Int(1)])
        .unwrap_err();
    assert_eq!(error.error_type, ErrorType::Ir);
}
