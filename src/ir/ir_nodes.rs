//! ============================================================
//!                          IR Nodes
//! ============================================================
//! The owned intermediate representation the fusion pass runs over.
//!  - All functions, blocks and locals are referenced through stable IDs
//!  - Locals are not SSA: statements assign into them explicitly
//!  - Every block ends in exactly one terminator
//!  - Names live in the StringTable, never inline
//!
//! Functions are stored in an arena indexed by FunctionId and are never
//! removed, so FunctionIds stay valid for the whole pass run. The textual
//! order of the module is a separate list, which is where a synthesized
//! function is inserted in front of its consumer.
//!
//! Statements carry per-function StatementIds so call sites can be handed
//! around and rewritten without dangling block/offset positions.

use crate::string_interning::StringId;
use serde::{Deserialize, Serialize};

// ============================================================
// Stable IDs
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementId(pub u32);

// ============================================================
// Types
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrType {
    Int,
    Float,
    Bool,

    /// The return type of functions that produce no value.
    Unit,
}

// ============================================================
// Module
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrModule {
    /// Arena of all functions, indexed by FunctionId. Never shrinks.
    pub functions: Vec<IrFunction>,

    /// The module's function list in textual order.
    pub order: Vec<FunctionId>,
}

impl IrModule {
    pub fn new() -> Self {
        IrModule {
            functions: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn function(&self, id: FunctionId) -> &IrFunction {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut IrFunction {
        &mut self.functions[id.0 as usize]
    }

    /// Append a function to the arena and the end of the module order.
    pub fn add_function(&mut self, mut function: IrFunction) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        function.id = id;
        self.functions.push(function);
        self.order.push(id);
        id
    }

    /// Append a function to the arena, placed immediately before `before`
    /// in the module order.
    pub fn insert_function_before(
        &mut self,
        mut function: IrFunction,
        before: FunctionId,
    ) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        function.id = id;
        self.functions.push(function);

        match self.order.iter().position(|&f| f == before) {
            Some(index) => self.order.insert(index, id),
            None => self.order.push(id),
        }

        id
    }

    /// Functions in module order.
    pub fn ordered_functions(&self) -> impl Iterator<Item = &IrFunction> {
        self.order.iter().map(|&id| self.function(id))
    }
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Functions
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrSignature {
    pub params: Vec<IrType>,
    pub return_type: IrType,
    pub is_varargs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible only inside this module. All fused functions are internal.
    Internal,

    /// Part of the module's external surface.
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrFunction {
    pub id: FunctionId,
    pub name: StringId,
    pub signature: IrSignature,
    pub linkage: Linkage,

    /// None for declarations (external functions with no body here).
    pub body: Option<IrBody>,
}

impl IrFunction {
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}

// ============================================================
// Bodies
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrBody {
    /// All locals of the function. The first `signature.params.len()`
    /// entries are the parameters, in declaration order.
    pub locals: Vec<IrLocal>,

    /// All blocks; BlockId indexes this list and blocks[0] is the entry.
    pub blocks: Vec<IrBlock>,

    /// Counter for handing out fresh StatementIds within this function.
    pub next_statement_id: u32,
}

impl IrBody {
    pub fn new_statement_id(&mut self) -> StatementId {
        let id = StatementId(self.next_statement_id);
        self.next_statement_id += 1;
        id
    }

    pub fn new_local(&mut self, name: StringId, ty: IrType) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(IrLocal { name, ty });
        id
    }

    pub fn local_type(&self, id: LocalId) -> IrType {
        self.locals[id.0 as usize].ty
    }

    /// Locate a statement by its stable ID. Rewrites shift positions, so
    /// positions are always recomputed from the ID rather than cached.
    pub fn find_statement(&self, id: StatementId) -> Option<(usize, usize)> {
        for (block_index, block) in self.blocks.iter().enumerate() {
            for (statement_index, statement) in block.statements.iter().enumerate() {
                if statement.id == id {
                    return Some((block_index, statement_index));
                }
            }
        }

        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrLocal {
    pub name: StringId,
    pub ty: IrType,
}

// ============================================================
// Blocks
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrBlock {
    pub id: BlockId,
    pub statements: Vec<IrStatement>,
    pub terminator: IrTerminator,
}

// ============================================================
// Statements
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrStatement {
    pub id: StatementId,
    pub kind: IrStatementKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrStatementKind {
    Assign {
        target: LocalId,
        value: IrExpression,
    },

    /// A direct call site. The callee is always statically known;
    /// this IR has no indirect call form.
    Call {
        target: FunctionId,
        args: Vec<IrOperand>,
        result: Option<LocalId>,
    },
}

// ============================================================
// Operands & Expressions
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IrOperand {
    Local(LocalId),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl IrOperand {
    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            IrOperand::Local(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrExpression {
    Operand(IrOperand),

    BinOp {
        left: IrOperand,
        op: BinOp,
        right: IrOperand,
    },

    UnaryOp {
        op: UnaryOp,
        operand: IrOperand,
    },
}

impl IrExpression {
    pub fn for_each_operand(&self, mut f: impl FnMut(&IrOperand)) {
        match self {
            IrExpression::Operand(operand) => f(operand),
            IrExpression::BinOp { left, right, .. } => {
                f(left);
                f(right);
            }
            IrExpression::UnaryOp { operand, .. } => f(operand),
        }
    }
}

// ============================================================
// Terminators (Explicit Control Flow)
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrTerminator {
    Jump {
        target: BlockId,
    },

    If {
        condition: IrOperand,
        then_block: BlockId,
        else_block: BlockId,
    },

    Return(Option<IrOperand>),
}

impl IrTerminator {
    pub fn for_each_operand(&self, mut f: impl FnMut(&IrOperand)) {
        match self {
            IrTerminator::Jump { .. } => {}
            IrTerminator::If { condition, .. } => f(condition),
            IrTerminator::Return(Some(operand)) => f(operand),
            IrTerminator::Return(None) => {}
        }
    }
}

// ============================================================
// Operators
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}
