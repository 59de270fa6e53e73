//! ============================================================
//!                      Function Fusion
//! ============================================================
//! Whole-module producer/consumer call fusion.
//!
//! A chain is a call whose result feeds exactly one argument of exactly
//! one later call in the same block, with no intervening write to the
//! producer's own arguments. For every distinct
//! (consumer, producer, argument position) triple this pass synthesizes
//! one fused function that runs the producer and the consumer back to
//! back with both calls inlined away, then rewrites every matching pair
//! of call sites into a single call to it.
//!
//! The pass runs to a fixpoint: rewriting a chain can expose a new one
//! (a fused call feeding yet another call), so scanning repeats until a
//! round finds nothing. Fused functions are cached across rounds, as are
//! triples that turned out to be uninlinable, so no work repeats.

use crate::ir::ir_builder::FunctionBuilder;
use crate::ir::ir_display::IrLocation;
use crate::ir::ir_nodes::{
    FunctionId, IrBlock, IrBody, IrModule, IrOperand, IrStatementKind, IrType, StatementId,
};
use crate::messages::errors::FusionError;
use crate::optimizers::inline::{can_inline, inline_call};
use crate::settings::{Config, FUSED_NAME_SUFFIX, LIKELY_CHAINS_PER_ROUND, NO_FUSE_SUFFIX};
use crate::string_interning::StringTable;
use crate::{fusion_log, return_compiler_error};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::{self, Write};

/// One fused function serves every chain with the same consumer,
/// producer and fused argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FusionTriple {
    pub consumer: FunctionId,
    pub producer: FunctionId,
    pub position: usize,
}

/// A concrete producer/consumer call pair found during a scan,
/// addressed by stable statement IDs so rewrites can't invalidate it.
#[derive(Debug, Clone, Copy)]
struct Chain {
    caller: FunctionId,
    producer_site: StatementId,
    consumer_site: StatementId,
}

/// Everything one scan found, grouped by triple in discovery order.
struct RoundPlan {
    groups: Vec<(FusionTriple, Vec<Chain>)>,
}

impl RoundPlan {
    fn new() -> Self {
        RoundPlan {
            groups: Vec::with_capacity(LIKELY_CHAINS_PER_ROUND),
        }
    }

    fn add(&mut self, triple: FusionTriple, chain: Chain) {
        match self.groups.iter_mut().find(|(t, _)| *t == triple) {
            Some((_, chains)) => chains.push(chain),
            None => self.groups.push((triple, vec![chain])),
        }
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Per-local read/write counts within one function body, used to decide
/// whether a call result flows into exactly one other call.
#[derive(Clone, Copy, Default)]
struct LocalUsage {
    assigns: u32,
    reads: u32,

    /// Set when a read appears directly as a call argument. Only
    /// meaningful while `reads == 1`.
    call_reader: Option<StatementId>,
}

pub struct FunctionFusion<'t> {
    string_table: &'t mut StringTable,

    /// Fused functions already synthesized, keyed by triple.
    fused: FxHashMap<FusionTriple, FunctionId>,

    /// Triples that can never be fused (declaration or variadic callee),
    /// so scans stop offering them.
    rejected: FxHashSet<FusionTriple>,

    functions_seen: usize,
    calls_seen: usize,
    functions_cloned: usize,
    calls_replaced: usize,
    rounds: u32,
}

impl<'t> FunctionFusion<'t> {
    pub fn new(string_table: &'t mut StringTable) -> Self {
        FunctionFusion {
            string_table,
            fused: FxHashMap::default(),
            rejected: FxHashSet::default(),
            functions_seen: 0,
            calls_seen: 0,
            functions_cloned: 0,
            calls_replaced: 0,
            rounds: 0,
        }
    }

    /// Run the pass over `module` until no fusable chain remains.
    pub fn run(&mut self, module: &mut IrModule, config: &Config) -> Result<(), FusionError> {
        self.collect_module_stats(module);

        loop {
            let plan = self.scan_round(module);
            if plan.is_empty() {
                break;
            }

            if self.rounds >= config.max_rounds() {
                return_compiler_error!(
                    format!(
                        "Fusion did not reach a fixpoint within {} rounds",
                        config.max_rounds()
                    ),
                    IrLocation::Module
                );
            }

            self.rounds += 1;
            fusion_log!(
                "round {}: {} fusion group(s)",
                self.rounds,
                plan.groups.len()
            );

            self.apply_round(module, plan)?;
        }

        Ok(())
    }

    /// Defined-function and call counts of the module as handed in,
    /// before any rewriting. These are the first and third report columns.
    /// Calls to declarations are not counted.
    fn collect_module_stats(&mut self, module: &IrModule) {
        self.functions_seen = module
            .functions
            .iter()
            .filter(|function| !function.is_declaration())
            .count();

        self.calls_seen = module
            .functions
            .iter()
            .filter_map(|function| function.body.as_ref())
            .flat_map(|body| &body.blocks)
            .flat_map(|block| &block.statements)
            .filter(|statement| match &statement.kind {
                IrStatementKind::Call { target, .. } => {
                    !module.function(*target).is_declaration()
                }
                _ => false,
            })
            .count();
    }

    /// One full scan of the module. Each call statement can join at most
    /// one chain per round, as producer or consumer, so overlapping
    /// chains wait for the next round.
    fn scan_round(&mut self, module: &IrModule) -> RoundPlan {
        let mut plan = RoundPlan::new();

        for &function_id in &module.order {
            let Some(body) = &module.function(function_id).body else {
                continue;
            };

            let usage = collect_local_usage(body);
            let mut claimed: FxHashSet<StatementId> = FxHashSet::default();

            for (block_index, block) in body.blocks.iter().enumerate() {
                for (statement_index, statement) in block.statements.iter().enumerate() {
                    let IrStatementKind::Call {
                        target: producer,
                        args: producer_args,
                        result: Some(result),
                    } = &statement.kind
                    else {
                        continue;
                    };

                    let use_of_result = usage[result.0 as usize];
                    if use_of_result.assigns != 1 || use_of_result.reads != 1 {
                        continue;
                    }

                    let Some(consumer_site) = use_of_result.call_reader else {
                        continue;
                    };

                    let Some((consumer_block, consumer_index)) = body.find_statement(consumer_site)
                    else {
                        continue;
                    };

                    // Fusing moves the producer's argument evaluation to the
                    // consumer site, so the consumer must come later in the
                    // same block and nothing in between may write a local the
                    // producer call reads
                    if consumer_block != block_index || consumer_index <= statement_index {
                        continue;
                    }

                    if writes_producer_input(block, statement_index, consumer_index, producer_args)
                    {
                        continue;
                    }

                    let IrStatementKind::Call {
                        target: consumer,
                        args: consumer_args,
                        ..
                    } = &body.blocks[consumer_block].statements[consumer_index].kind
                    else {
                        continue;
                    };

                    let Some(position) = consumer_args
                        .iter()
                        .position(|arg| arg.as_local() == Some(*result))
                    else {
                        continue;
                    };

                    let triple = FusionTriple {
                        consumer: *consumer,
                        producer: *producer,
                        position,
                    };

                    if self.rejected.contains(&triple) {
                        continue;
                    }

                    if self.opted_out(module, *producer) || self.opted_out(module, *consumer) {
                        continue;
                    }

                    if !can_inline(module, *producer) || !can_inline(module, *consumer) {
                        self.rejected.insert(triple);
                        continue;
                    }

                    if claimed.contains(&statement.id) || claimed.contains(&consumer_site) {
                        continue;
                    }

                    claimed.insert(statement.id);
                    claimed.insert(consumer_site);

                    plan.add(
                        triple,
                        Chain {
                            caller: function_id,
                            producer_site: statement.id,
                            consumer_site,
                        },
                    );
                }
            }
        }

        plan
    }

    fn apply_round(&mut self, module: &mut IrModule, plan: RoundPlan) -> Result<(), FusionError> {
        for (triple, chains) in plan.groups {
            let fused = match self.fused.get(&triple) {
                Some(&id) => id,
                None => {
                    let id = self.build_fused_function(module, &triple)?;
                    self.fused.insert(triple, id);
                    self.functions_cloned += 1;
                    id
                }
            };

            for chain in chains {
                self.replace_chain(module, &triple, fused, &chain)?;
            }
        }

        Ok(())
    }

    /// Synthesize the fused function for `triple`: the producer's
    /// parameters followed by the consumer's with the fused slot removed,
    /// both calls spelled out and then inlined away. Placed right before
    /// the consumer in the module order, with internal linkage.
    fn build_fused_function(
        &mut self,
        module: &mut IrModule,
        triple: &FusionTriple,
    ) -> Result<FunctionId, FusionError> {
        let producer = module.function(triple.producer);
        let consumer = module.function(triple.consumer);

        // can_inline held during the scan, so both bodies exist
        let (Some(producer_body), Some(consumer_body)) = (&producer.body, &consumer.body) else {
            return_compiler_error!(
                format!(
                    "Fusion of {:?} into {:?} reached building with a missing body",
                    triple.producer, triple.consumer
                ),
                IrLocation::Module
            );
        };

        let producer_params = producer.signature.params.len();
        let producer_return = producer.signature.return_type;
        let consumer_return = consumer.signature.return_type;

        let base = format!(
            "{}{}{}{}",
            self.string_table.resolve(consumer.name),
            self.string_table.resolve(producer.name),
            triple.position,
            FUSED_NAME_SUFFIX,
        );

        // The module may already contain a function with this name
        let mut name = base.clone();
        let mut attempt = 0u32;
        while self.name_in_use(module, &name) {
            attempt += 1;
            name = format!("{base}.{attempt}");
        }

        // Parameters are named after their origin function plus the
        // original parameter name, purely for readable dumps
        let mut param_names: Vec<String> = Vec::new();
        let mut param_types: Vec<IrType> = Vec::new();

        for (index, ty) in producer.signature.params.iter().enumerate() {
            let producer_name = self.string_table.resolve(producer.name);
            let local_name = self.string_table.resolve(producer_body.locals[index].name);
            param_names.push(format!("{producer_name}{local_name}"));
            param_types.push(*ty);
        }

        for (index, ty) in consumer.signature.params.iter().enumerate() {
            if index == triple.position {
                continue;
            }

            let consumer_name = self.string_table.resolve(consumer.name);
            let local_name = self.string_table.resolve(consumer_body.locals[index].name);
            param_names.push(format!("{consumer_name}{local_name}"));
            param_types.push(*ty);
        }

        let params: Vec<(&str, IrType)> = param_names
            .iter()
            .map(String::as_str)
            .zip(param_types)
            .collect();

        let mut builder =
            FunctionBuilder::new(&name, &params, consumer_return, self.string_table).internal();

        let produced = builder.new_local("produced", producer_return);

        let producer_args: Vec<IrOperand> = (0..producer_params)
            .map(|index| IrOperand::Local(builder.param(index)))
            .collect();
        let producer_call = builder.call(triple.producer, producer_args, Some(produced));

        // Consumer args: the fused slot takes the produced value, the rest
        // come off the remaining parameters in order
        let mut next_param = producer_params;
        let consumer_args: Vec<IrOperand> = (0..consumer.signature.params.len())
            .map(|index| {
                if index == triple.position {
                    IrOperand::Local(produced)
                } else {
                    let param = builder.param(next_param);
                    next_param += 1;
                    IrOperand::Local(param)
                }
            })
            .collect();

        let (consumed, returned) = if consumer_return == IrType::Unit {
            (None, None)
        } else {
            let consumed = builder.new_local("consumed", consumer_return);
            (Some(consumed), Some(IrOperand::Local(consumed)))
        };

        let consumer_call = builder.call(triple.consumer, consumer_args, consumed);
        builder.ret(returned);

        let fused = builder.finish_before(module, triple.consumer);

        fusion_log!(
            "built fused function '{}' for {:?}",
            name,
            triple
        );

        inline_call(module, fused, producer_call)?;
        inline_call(module, fused, consumer_call)?;

        Ok(fused)
    }

    /// Rewrite one chain: the consumer call becomes a call to the fused
    /// function carrying the producer's arguments plus its own (minus the
    /// fused slot), and the producer call disappears.
    fn replace_chain(
        &mut self,
        module: &mut IrModule,
        triple: &FusionTriple,
        fused: FunctionId,
        chain: &Chain,
    ) -> Result<(), FusionError> {
        let Some(body) = module.function_mut(chain.caller).body.as_mut() else {
            return_compiler_error!(
                format!("Chain caller {:?} lost its body", chain.caller),
                IrLocation::Function(chain.caller)
            );
        };

        let Some((producer_block, producer_index)) = body.find_statement(chain.producer_site)
        else {
            return_compiler_error!(
                format!("Chain producer site {:?} vanished", chain.producer_site),
                IrLocation::Function(chain.caller)
            );
        };

        let producer_statement = &body.blocks[producer_block].statements[producer_index];
        let IrStatementKind::Call {
            args: producer_args,
            result: Some(produced),
            ..
        } = &producer_statement.kind
        else {
            return_compiler_error!(
                format!(
                    "Chain producer site {:?} is no longer a result-bearing call",
                    chain.producer_site
                ),
                IrLocation::Statement(chain.caller, chain.producer_site)
            );
        };

        let producer_args = producer_args.clone();
        let produced = *produced;

        let Some((consumer_block, consumer_index)) = body.find_statement(chain.consumer_site)
        else {
            return_compiler_error!(
                format!("Chain consumer site {:?} vanished", chain.consumer_site),
                IrLocation::Function(chain.caller)
            );
        };

        let consumer_statement = &body.blocks[consumer_block].statements[consumer_index];
        let IrStatementKind::Call {
            args: consumer_args,
            result: consumer_result,
            ..
        } = &consumer_statement.kind
        else {
            return_compiler_error!(
                format!(
                    "Chain consumer site {:?} is no longer a call",
                    chain.consumer_site
                ),
                IrLocation::Statement(chain.caller, chain.consumer_site)
            );
        };

        if consumer_args
            .get(triple.position)
            .and_then(IrOperand::as_local)
            != Some(produced)
        {
            return_compiler_error!(
                format!(
                    "Chain consumer site {:?} no longer takes the produced value at position {}",
                    chain.consumer_site, triple.position
                ),
                IrLocation::Statement(chain.caller, chain.consumer_site)
            );
        }

        let mut fused_args = producer_args;
        fused_args.extend(
            consumer_args
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != triple.position)
                .map(|(_, arg)| *arg),
        );
        let consumer_result = *consumer_result;

        // The consumer call becomes the fused call in place, keeping its
        // statement ID and result local; the producer call is deleted
        body.blocks[consumer_block].statements[consumer_index].kind = IrStatementKind::Call {
            target: fused,
            args: fused_args,
            result: consumer_result,
        };

        body.blocks[producer_block]
            .statements
            .remove(producer_index);

        self.calls_replaced += 2;

        Ok(())
    }

    fn name_in_use(&self, module: &IrModule, name: &str) -> bool {
        match self.string_table.get_existing(name) {
            Some(id) => module.functions.iter().any(|function| function.name == id),
            None => false,
        }
    }

    fn opted_out(&self, module: &IrModule, function: FunctionId) -> bool {
        self.string_table
            .resolve(module.function(function).name)
            .ends_with(NO_FUSE_SUFFIX)
    }

    pub fn summary(&self) -> FusionSummary {
        FusionSummary {
            functions_seen: self.functions_seen,
            functions_cloned: self.functions_cloned,
            calls_seen: self.calls_seen,
            calls_replaced: self.calls_replaced,
            rounds: self.rounds,
        }
    }
}

/// The counts the pass reports when it finishes. The "seen" columns
/// describe the module as handed in, the other two describe work done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionSummary {
    pub functions_seen: usize,
    pub functions_cloned: usize,
    pub calls_seen: usize,
    pub calls_replaced: usize,
    pub rounds: u32,
}

impl FusionSummary {
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "# functions; # cloned functions; # calls; # replaced calls"
        )?;
        writeln!(
            out,
            "{};{};{};{}",
            self.functions_seen, self.functions_cloned, self.calls_seen, self.calls_replaced
        )
    }
}

/// Whether any statement strictly between the producer and the consumer
/// writes a local the producer call reads.
fn writes_producer_input(
    block: &IrBlock,
    producer_index: usize,
    consumer_index: usize,
    producer_args: &[IrOperand],
) -> bool {
    block.statements[producer_index + 1..consumer_index]
        .iter()
        .any(|statement| {
            let written = match &statement.kind {
                IrStatementKind::Assign { target, .. } => Some(*target),
                IrStatementKind::Call { result, .. } => *result,
            };

            match written {
                Some(local) => producer_args
                    .iter()
                    .any(|arg| arg.as_local() == Some(local)),
                None => false,
            }
        })
}

fn collect_local_usage(body: &IrBody) -> Vec<LocalUsage> {
    let mut usage = vec![LocalUsage::default(); body.locals.len()];

    fn read(usage: &mut [LocalUsage], operand: &IrOperand) {
        if let Some(local) = operand.as_local() {
            usage[local.0 as usize].reads += 1;
        }
    }

    for block in &body.blocks {
        for statement in &block.statements {
            match &statement.kind {
                IrStatementKind::Assign { target, value } => {
                    value.for_each_operand(|operand| read(&mut usage, operand));
                    usage[target.0 as usize].assigns += 1;
                }

                IrStatementKind::Call { args, result, .. } => {
                    for arg in args {
                        read(&mut usage, arg);
                        if let Some(local) = arg.as_local() {
                            usage[local.0 as usize].call_reader = Some(statement.id);
                        }
                    }

                    if let Some(result) = result {
                        usage[result.0 as usize].assigns += 1;
                    }
                }
            }
        }

        block
            .terminator
            .for_each_operand(|operand| read(&mut usage, operand));
    }

    usage
}
