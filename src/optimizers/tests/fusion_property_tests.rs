#![cfg(test)]

//! Property tests over randomly shaped chains: arbitrary producer and
//! consumer arities and an arbitrary fused argument position must never
//! change what the module computes.

use crate::ir::interpreter::{Interpreter, IrValue};
use crate::ir::ir_builder::FunctionBuilder;
use crate::ir::ir_nodes::{BinOp, FunctionId, IrExpression, IrModule, IrOperand, IrType};
use crate::ir::ir_validation::validate_module;
use crate::optimizers::function_fusion::FunctionFusion;
use crate::settings::Config;
use crate::string_interning::StringTable;
use proptest::prelude::*;

/// `name(x0..xn) = 1 + sum of (i + 1) * xi`, so every argument position
/// contributes differently and a mixed-up rewrite shows up in the result.
fn weighted_sum(
    module: &mut IrModule,
    table: &mut StringTable,
    name: &str,
    arity: usize,
) -> FunctionId {
    let names: Vec<String> = (0..arity).map(|i| format!("x{i}")).collect();
    let params: Vec<(&str, IrType)> = names
        .iter()
        .map(|n| (n.as_str(), IrType::Int))
        .collect();

    let mut f = FunctionBuilder::new(name, &params, IrType::Int, table);
    let acc = f.new_local("acc", IrType::Int);
    f.assign(acc, IrExpression::Operand(IrOperand::Int(1)));

    for i in 0..arity {
        let scaled = f.new_local(&format!("scaled{i}"), IrType::Int);
        f.assign(
            scaled,
            IrExpression::BinOp {
                left: IrOperand::Local(f.param(i)),
                op: BinOp::Mul,
                right: IrOperand::Int(i as i64 + 1),
            },
        );
        f.assign(
            acc,
            IrExpression::BinOp {
                left: IrOperand::Local(acc),
                op: BinOp::Add,
                right: IrOperand::Local(scaled),
            },
        );
    }

    f.ret(Some(IrOperand::Local(acc)));
    f.finish(module)
}

fn chain_with_shape(
    producer_arity: usize,
    consumer_arity: usize,
    position: usize,
    literals: &[i64],
) -> (IrModule, StringTable) {
    let mut table = StringTable::new();
    let mut module = IrModule::new();

    let producer = weighted_sum(&mut module, &mut table, "prod", producer_arity);
    let consumer = weighted_sum(&mut module, &mut table, "cons", consumer_arity);

    let mut main = FunctionBuilder::new("main", &[], IrType::Int, &mut table);
    let t = main.new_local("t", IrType::Int);
    let r = main.new_local("r", IrType::Int);

    let producer_args = (0..producer_arity)
        .map(|i| IrOperand::Int(literals[i]))
        .collect();
    main.call(producer, producer_args, Some(t));

    let mut next_literal = producer_arity;
    let consumer_args = (0..consumer_arity)
        .map(|i| {
            if i == position {
                IrOperand::Local(t)
            } else {
                let literal = IrOperand::Int(literals[next_literal]);
                next_literal += 1;
                literal
            }
        })
        .collect();
    main.call(consumer, consumer_args, Some(r));

    main.ret(Some(IrOperand::Local(r)));
    main.finish(&mut module);

    (module, table)
}

fn eval_main(module: &IrModule, table: &StringTable) -> Option<IrValue> {
    let mut interpreter = Interpreter::new(module, table);
    interpreter.call_by_name("main", &[]).unwrap()
}

proptest! {
    #[test]
    fn fusion_never_changes_the_result(
        producer_arity in 1usize..4,
        consumer_arity in 1usize..4,
        position_seed in 0usize..16,
        literals in proptest::collection::vec(-50i64..50, 8),
    ) {
        let position = position_seed % consumer_arity;

        let (mut module, mut table) =
            chain_with_shape(producer_arity, consumer_arity, position, &literals);

        let before = eval_main(&module, &table);

        let config = Config::default();
        let summary = {
            let mut pass = FunctionFusion::new(&mut table);
            pass.run(&mut module, &config).unwrap();
            pass.summary()
        };

        prop_assert_eq!(summary.functions_cloned, 1);
        prop_assert_eq!(summary.calls_replaced, 2);

        validate_module(&module, &table).unwrap();
        prop_assert_eq!(eval_main(&module, &table), before);

        // Producer params ++ consumer params minus the fused slot
        let fused_name = format!("consprod{position}.fused");
        let name_id = table.get_existing(&fused_name).unwrap();
        let fused = module.functions.iter().find(|f| f.name == name_id).unwrap();
        prop_assert_eq!(
            fused.signature.params.len(),
            producer_arity + consumer_arity - 1
        );
    }

    #[test]
    fn a_second_run_finds_nothing(
        producer_arity in 1usize..4,
        consumer_arity in 1usize..4,
        literals in proptest::collection::vec(-50i64..50, 8),
    ) {
        let (mut module, mut table) =
            chain_with_shape(producer_arity, consumer_arity, 0, &literals);

        let config = Config::default();
        {
            let mut pass = FunctionFusion::new(&mut table);
            pass.run(&mut module, &config).unwrap();
        }

        let second = {
            let mut pass = FunctionFusion::new(&mut table);
            pass.run(&mut module, &config).unwrap();
            pass.summary()
        };

        prop_assert_eq!(second.functions_cloned, 0);
        prop_assert_eq!(second.calls_replaced, 0);
        prop_assert_eq!(second.rounds, 0);
    }
}
