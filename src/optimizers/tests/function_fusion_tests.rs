#![cfg(test)]

use crate::ir::interpreter::{Interpreter, IrValue};
use crate::ir::ir_builder::FunctionBuilder;
use crate::ir::ir_nodes::{IrModule, IrOperand, IrStatementKind, IrType, Linkage};
use crate::ir::ir_validation::validate_module;
use crate::optimizers::function_fusion::{FunctionFusion, FusionSummary};
use crate::optimizers::tests::test_support::{
    add_consume, add_doubler, chain_module, declaration_producer_module, double_use_module,
    triple_chain_module,
};
use crate::settings::Config;
use crate::string_interning::StringTable;

fn run_pass(module: &mut IrModule, table: &mut StringTable) -> FusionSummary {
    let config = Config::default();
    let mut pass = FunctionFusion::new(table);
    pass.run(module, &config).unwrap();
    pass.summary()
}

fn eval_main(module: &IrModule, table: &StringTable) -> Option<IrValue> {
    let mut interpreter = Interpreter::new(module, table);
    interpreter.call_by_name("main", &[]).unwrap()
}

fn call_count(module: &IrModule) -> usize {
    module
        .functions
        .iter()
        .filter_map(|f| f.body.as_ref())
        .flat_map(|b| &b.blocks)
        .flat_map(|b| &b.statements)
        .filter(|s| matches!(s.kind, IrStatementKind::Call { .. }))
        .count()
}

#[test]
fn a_simple_chain_fuses_into_one_call() {
    let (mut module, mut table) = chain_module();
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(17)));

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_seen, 3);
    assert_eq!(summary.calls_seen, 2);
    assert_eq!(summary.functions_cloned, 1);
    assert_eq!(summary.calls_replaced, 2);
    assert_eq!(summary.rounds, 1);

    validate_module(&module, &table).unwrap();
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(17)));
}

#[test]
fn the_fused_function_is_named_after_the_triple() {
    let (mut module, mut table) = chain_module();
    run_pass(&mut module, &mut table);

    let name = table.get_existing("consumemake0.fused").unwrap();
    let fused = module
        .functions
        .iter()
        .find(|f| f.name == name)
        .expect("fused function should exist");

    assert_eq!(fused.linkage, Linkage::Internal);

    // Producer params ++ consumer params minus the fused slot
    assert_eq!(fused.signature.params.len(), 2);
    assert_eq!(fused.signature.return_type, IrType::Int);

    // Both internal calls were inlined away
    let body = fused.body.as_ref().unwrap();
    let has_calls = body
        .blocks
        .iter()
        .flat_map(|b| &b.statements)
        .any(|s| matches!(s.kind, IrStatementKind::Call { .. }));
    assert!(!has_calls);
}

#[test]
fn the_fused_function_sits_before_its_consumer() {
    let (mut module, mut table) = chain_module();
    run_pass(&mut module, &mut table);

    let fused_name = table.get_existing("consumemake0.fused").unwrap();
    let consumer_name = table.get_existing("consume").unwrap();

    let position_of = |name| {
        module
            .order
            .iter()
            .position(|&id| module.function(id).name == name)
            .unwrap()
    };

    assert!(position_of(fused_name) < position_of(consumer_name));
}

#[test]
fn main_now_calls_the_fused_function_directly() {
    let (mut module, mut table) = chain_module();
    run_pass(&mut module, &mut table);

    let fused_name = table.get_existing("consumemake0.fused").unwrap();
    let main_name = table.get_existing("main").unwrap();

    let main = module
        .functions
        .iter()
        .find(|f| f.name == main_name)
        .unwrap();
    let body = main.body.as_ref().unwrap();

    let calls: Vec<_> = body
        .blocks
        .iter()
        .flat_map(|b| &b.statements)
        .filter_map(|s| match &s.kind {
            IrStatementKind::Call { target, args, .. } => Some((*target, args.clone())),
            _ => None,
        })
        .collect();

    // The two original calls became one
    assert_eq!(calls.len(), 1);
    let (target, args) = &calls[0];
    assert_eq!(module.function(*target).name, fused_name);

    // Producer args then consumer args minus the fused slot
    assert_eq!(args.as_slice(), &[IrOperand::Int(5), IrOperand::Int(7)]);
}

#[test]
fn a_declaration_producer_is_never_fused() {
    let (mut module, mut table) = declaration_producer_module();
    let calls_before = call_count(&module);

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 0);
    assert_eq!(summary.calls_replaced, 0);
    assert_eq!(summary.rounds, 0);
    assert_eq!(call_count(&module), calls_before);

    // The report only covers defined functions: the call to the external
    // declaration is left out of the calls column
    assert_eq!(summary.functions_seen, 2);
    assert_eq!(summary.calls_seen, 1);

    let mut out = Vec::new();
    summary.write_report(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "# functions; # cloned functions; # calls; # replaced calls\n2;0;1;0\n"
    );
}

#[test]
fn a_result_with_two_reads_is_not_a_chain() {
    let (mut module, mut table) = double_use_module();
    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 0);
    assert_eq!(summary.calls_replaced, 0);
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(20)));
}

#[test]
fn the_no_fuse_suffix_opts_a_function_out() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let make = add_doubler(&mut module, &mut table, "make.alwaysinline");
    let consume = add_consume(&mut module, &mut table);

    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let t = main.new_local("t", IrType::Int);
    let r = main.new_local("r", IrType::Int);
    main.call(make, vec![IrOperand::Int(5)], Some(t));
    main.call(
        consume,
        vec![IrOperand::Local(t), IrOperand::Int(7)],
        Some(r),
    );
    main.ret(Some(IrOperand::Local(r)));
    main.finish(&mut module);

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 0);
    assert_eq!(summary.calls_replaced, 0);
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(17)));
}

#[test]
fn a_three_call_chain_fuses_across_two_rounds() {
    let (mut module, mut table) = triple_chain_module();
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(8)));

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.functions_cloned, 2);
    assert_eq!(summary.calls_replaced, 4);

    // Round one fused f into g; round two fused that into h
    assert!(table.get_existing("gf0.fused").is_some());

    validate_module(&module, &table).unwrap();
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(8)));
}

#[test]
fn identical_chains_share_one_fused_function() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let make = add_doubler(&mut module, &mut table, "make");
    let consume = add_consume(&mut module, &mut table);

    // main() = consume(make(1), 2) + consume(make(3), 4) = 4 + 10
    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let t1 = main.new_local("t1", IrType::Int);
    let r1 = main.new_local("r1", IrType::Int);
    let t2 = main.new_local("t2", IrType::Int);
    let r2 = main.new_local("r2", IrType::Int);
    let out = main.new_local("out", IrType::Int);
    main.call(make, vec![IrOperand::Int(1)], Some(t1));
    main.call(
        consume,
        vec![IrOperand::Local(t1), IrOperand::Int(2)],
        Some(r1),
    );
    main.call(make, vec![IrOperand::Int(3)], Some(t2));
    main.call(
        consume,
        vec![IrOperand::Local(t2), IrOperand::Int(4)],
        Some(r2),
    );
    main.assign(
        out,
        crate::ir::ir_nodes::IrExpression::BinOp {
            left: IrOperand::Local(r1),
            op: crate::ir::ir_nodes::BinOp::Add,
            right: IrOperand::Local(r2),
        },
    );
    main.ret(Some(IrOperand::Local(out)));
    main.finish(&mut module);

    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(14)));

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 1);
    assert_eq!(summary.calls_replaced, 4);
    assert_eq!(summary.rounds, 1);

    validate_module(&module, &table).unwrap();
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(14)));
}

#[test]
fn a_write_between_the_calls_blocks_the_chain() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let make = add_doubler(&mut module, &mut table, "make");
    let consume = add_consume(&mut module, &mut table);

    // a = 3; t = make(a); a = 100; r = consume(t, 7)
    // Fusing would evaluate make's argument after the second write to `a`
    // and quietly turn 13 into 207
    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let a = main.new_local("a", IrType::Int);
    let t = main.new_local("t", IrType::Int);
    let r = main.new_local("r", IrType::Int);
    main.assign(
        a,
        crate::ir::ir_nodes::IrExpression::Operand(IrOperand::Int(3)),
    );
    main.call(make, vec![IrOperand::Local(a)], Some(t));
    main.assign(
        a,
        crate::ir::ir_nodes::IrExpression::Operand(IrOperand::Int(100)),
    );
    main.call(
        consume,
        vec![IrOperand::Local(t), IrOperand::Int(7)],
        Some(r),
    );
    main.ret(Some(IrOperand::Local(r)));
    main.finish(&mut module);

    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(13)));

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 0);
    assert_eq!(summary.calls_replaced, 0);
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(13)));
}

#[test]
fn a_consumer_ahead_of_its_producer_is_not_a_chain() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let make = add_doubler(&mut module, &mut table, "make");
    let consume = add_consume(&mut module, &mut table);

    // u = consume(t, 7); t = make(5); return u
    // The read of `t` happens before the producer runs, so it is not a
    // use of the producer's result and the module must stay untouched
    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let t = main.new_local("t", IrType::Int);
    let u = main.new_local("u", IrType::Int);
    main.call(
        consume,
        vec![IrOperand::Local(t), IrOperand::Int(7)],
        Some(u),
    );
    main.call(make, vec![IrOperand::Int(5)], Some(t));
    main.ret(Some(IrOperand::Local(u)));
    main.finish(&mut module);

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 0);
    assert_eq!(summary.calls_replaced, 0);
    assert_eq!(summary.rounds, 0);

    // The uninitialized read still faults, exactly as before the pass
    let mut interpreter = Interpreter::new(&module, &table);
    assert!(interpreter.call_by_name("main", &[]).is_err());
}

#[test]
fn chains_do_not_cross_block_boundaries() {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let make = add_doubler(&mut module, &mut table, "make");
    let consume = add_consume(&mut module, &mut table);

    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let t = main.new_local("t", IrType::Int);
    let r = main.new_local("r", IrType::Int);
    let rest = main.new_block();

    main.call(make, vec![IrOperand::Int(5)], Some(t));
    main.jump(rest);

    main.switch_to(rest);
    main.call(
        consume,
        vec![IrOperand::Local(t), IrOperand::Int(7)],
        Some(r),
    );
    main.ret(Some(IrOperand::Local(r)));
    main.finish(&mut module);

    let summary = run_pass(&mut module, &mut table);

    assert_eq!(summary.functions_cloned, 0);
    assert_eq!(summary.calls_replaced, 0);
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(17)));
}

#[test]
fn a_taken_fused_name_gets_a_numeric_suffix() {
    let (mut module, mut table) = chain_module();

    // A user function already occupies the name the triple would pick
    add_doubler(&mut module, &mut table, "consumemake0.fused");

    let summary = run_pass(&mut module, &mut table);
    assert_eq!(summary.functions_cloned, 1);

    let fused_name = table.get_existing("consumemake0.fused.1").unwrap();
    let fused = module
        .functions
        .iter()
        .find(|f| f.name == fused_name)
        .expect("fused function should take the suffixed name");
    assert_eq!(fused.linkage, Linkage::Internal);

    validate_module(&module, &table).unwrap();
    assert_eq!(eval_main(&module, &table), Some(IrValue::Int(17)));
}

#[test]
fn the_pass_is_idempotent() {
    let (mut module, mut table) = chain_module();
    run_pass(&mut module, &mut table);

    let second = run_pass(&mut module, &mut table);
    assert_eq!(second.functions_cloned, 0);
    assert_eq!(second.calls_replaced, 0);
    assert_eq!(second.rounds, 0);
}

#[test]
fn the_report_has_the_two_line_format() {
    let (mut module, mut table) = chain_module();
    let summary = run_pass(&mut module, &mut table);

    let mut out = Vec::new();
    summary.write_report(&mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "# functions; # cloned functions; # calls; # replaced calls\n3;1;2;2\n"
    );
}
