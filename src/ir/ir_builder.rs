//! Programmatic IR construction.
//!
//! Embedders and tests build functions through this rather than assembling
//! the node structs by hand, so invariants like "params are the first
//! locals" and "every block has a terminator" hold by construction.

use crate::ir::ir_nodes::{
    BlockId, FunctionId, IrBlock, IrBody, IrExpression, IrFunction, IrModule, IrOperand,
    IrSignature, IrStatement, IrStatementKind, IrTerminator, IrType, Linkage, LocalId,
};
use crate::string_interning::StringTable;

/// Builds one function body block by block.
///
/// Every block starts out terminated by `Return(None)` so a finished
/// function is always structurally complete; `ret`/`jump`/`branch`
/// overwrite the placeholder.
pub struct FunctionBuilder<'t> {
    name: String,
    signature: IrSignature,
    linkage: Linkage,
    body: IrBody,
    current_block: BlockId,
    pub string_table: &'t mut StringTable,
}

impl<'t> FunctionBuilder<'t> {
    pub fn new(
        name: &str,
        params: &[(&str, IrType)],
        return_type: IrType,
        string_table: &'t mut StringTable,
    ) -> Self {
        let mut body = IrBody {
            locals: Vec::new(),
            blocks: Vec::new(),
            next_statement_id: 0,
        };

        for (param_name, param_type) in params {
            let id = string_table.intern(param_name);
            body.new_local(id, *param_type);
        }

        body.blocks.push(IrBlock {
            id: BlockId(0),
            statements: Vec::new(),
            terminator: IrTerminator::Return(None),
        });

        FunctionBuilder {
            name: name.to_string(),
            signature: IrSignature {
                params: params.iter().map(|(_, ty)| *ty).collect(),
                return_type,
                is_varargs: false,
            },
            linkage: Linkage::External,
            body,
            current_block: BlockId(0),
            string_table,
        }
    }

    pub fn varargs(mut self) -> Self {
        self.signature.is_varargs = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.linkage = Linkage::Internal;
        self
    }

    /// The LocalId of a declared parameter.
    pub fn param(&self, index: usize) -> LocalId {
        LocalId(index as u32)
    }

    pub fn new_local(&mut self, name: &str, ty: IrType) -> LocalId {
        let id = self.string_table.intern(name);
        self.body.new_local(id, ty)
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.body.blocks.len() as u32);
        self.body.blocks.push(IrBlock {
            id,
            statements: Vec::new(),
            terminator: IrTerminator::Return(None),
        });
        id
    }

    /// Direct later statements into the given block.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn assign(&mut self, target: LocalId, value: IrExpression) {
        let id = self.body.new_statement_id();
        self.push(IrStatement {
            id,
            kind: IrStatementKind::Assign { target, value },
        });
    }

    pub fn call(
        &mut self,
        target: FunctionId,
        args: Vec<IrOperand>,
        result: Option<LocalId>,
    ) -> crate::ir::ir_nodes::StatementId {
        let id = self.body.new_statement_id();
        self.push(IrStatement {
            id,
            kind: IrStatementKind::Call {
                target,
                args,
                result,
            },
        });
        id
    }

    pub fn ret(&mut self, value: Option<IrOperand>) {
        self.terminate(IrTerminator::Return(value));
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(IrTerminator::Jump { target });
    }

    pub fn branch(&mut self, condition: IrOperand, then_block: BlockId, else_block: BlockId) {
        self.terminate(IrTerminator::If {
            condition,
            then_block,
            else_block,
        });
    }

    pub fn finish(self, module: &mut IrModule) -> FunctionId {
        let name = self.string_table.get_or_intern(self.name);
        module.add_function(IrFunction {
            id: FunctionId(0), // assigned by add_function
            name,
            signature: self.signature,
            linkage: self.linkage,
            body: Some(self.body),
        })
    }

    /// Like `finish`, but placed before `before` in the module order.
    pub fn finish_before(self, module: &mut IrModule, before: FunctionId) -> FunctionId {
        let name = self.string_table.get_or_intern(self.name);
        module.insert_function_before(
            IrFunction {
                id: FunctionId(0), // assigned by insert_function_before
                name,
                signature: self.signature,
                linkage: self.linkage,
                body: Some(self.body),
            },
            before,
        )
    }

    fn push(&mut self, statement: IrStatement) {
        self.body.blocks[self.current_block.0 as usize]
            .statements
            .push(statement);
    }

    fn terminate(&mut self, terminator: IrTerminator) {
        self.body.blocks[self.current_block.0 as usize].terminator = terminator;
    }
}

/// Add an external declaration (a function with no body) to the module.
pub fn declare_function(
    module: &mut IrModule,
    name: &str,
    params: &[IrType],
    return_type: IrType,
    string_table: &mut StringTable,
) -> FunctionId {
    let name = string_table.intern(name);
    module.add_function(IrFunction {
        id: FunctionId(0), // assigned by add_function
        name,
        signature: IrSignature {
            params: params.to_vec(),
            return_type,
            is_varargs: false,
        },
        linkage: Linkage::External,
        body: None,
    })
}
