//! Read-only SSA program view (C1).
//!
//! Modeled "arena + index" style per the engine's design notes: blocks and
//! values live in per-function `Vec`s and are addressed by small integer
//! handles rather than pointers, so cycles (phi nodes, loops) never need
//! unsafe aliasing to walk.

use rustc_hash::FxHashMap;

use super::types::Type;

pub type ValueId = u32;
pub type BlockId = u32;

/// Source position of an instruction, when the caller's position table has
/// a mapping for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// Flip the comparison direction, used when the constant is the LHS
    /// operand (`c < x` becomes `x > c`).
    pub fn flip(&self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Le => BinOp::Ge,
            BinOp::Gt => BinOp::Lt,
            BinOp::Ge => BinOp::Le,
            other => *other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// A callee reference: direct by qualified name, indirect through a value
/// (closure/function pointer), or an interface method invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Direct(String),
    Indirect(ValueId),
    Interface { receiver: ValueId, method: String },
}

/// One constant literal. Kept separate from `Instr::Const` payload types so
/// value helpers can pattern match without threading a `Type` everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i128),
    Str(String),
    Bool(bool),
    /// A slice/array literal made entirely of hardcoded elements, e.g.
    /// `[]byte{0,0,0,0,0,0,0,0,0,0,0,0}`.
    SliceLiteral(Vec<Const>),
    Zero,
}

impl Const {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Const::Int(v) => Some(*v),
            Const::Bool(b) => Some(*b as i128),
            _ => None,
        }
    }
}

/// The closed set of SSA instruction variants (§3). Every rule's case
/// analysis over this type must be exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Const(Const),
    Param(usize),
    FreeVar(usize),
    BinOp { op: BinOp, a: ValueId, b: ValueId },
    UnOp { op: UnOp, a: ValueId },
    Convert { a: ValueId },
    /// `a[low:high:max]`; missing indices are `None`.
    Slice { base: ValueId, low: Option<ValueId>, high: Option<ValueId>, max: Option<ValueId> },
    IndexAddr { base: ValueId, index: ValueId },
    FieldAddr { base: ValueId, field: String },
    Store { addr: ValueId, value: ValueId },
    /// Unary dereference load.
    Load { addr: ValueId },
    Phi { edges: Vec<(BlockId, ValueId)> },
    Call { callee: Callee, args: Vec<ValueId> },
    MakeClosure { func: String, captures: Vec<ValueId> },
    MakeSlice { elem: Type, len: Option<ValueId>, cap: Option<ValueId> },
    /// Allocation of a local (possibly zero-initialized) slot.
    Alloc { ty: Type, zero_init: bool },
    Go { call: ValueId },
    Defer { call: ValueId },
    Extract { tuple: ValueId, index: usize },
    Return { values: Vec<ValueId> },
    If { cond: ValueId, then_blk: BlockId, else_blk: BlockId },
    Jump { target: BlockId },
}

impl Instr {
    /// Operand values this instruction reads, used to build referrer lists.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Instr::Const(_) | Instr::Param(_) | Instr::FreeVar(_) => vec![],
            Instr::BinOp { a, b, .. } => vec![*a, *b],
            Instr::UnOp { a, .. } => vec![*a],
            Instr::Convert { a } => vec![*a],
            Instr::Slice { base, low, high, max } => {
                let mut v = vec![*base];
                v.extend(low.iter().chain(high.iter()).chain(max.iter()).copied());
                v
            }
            Instr::IndexAddr { base, index } => vec![*base, *index],
            Instr::FieldAddr { base, .. } => vec![*base],
            Instr::Store { addr, value } => vec![*addr, *value],
            Instr::Load { addr } => vec![*addr],
            Instr::Phi { edges } => edges.iter().map(|(_, v)| *v).collect(),
            Instr::Call { callee, args } => {
                let mut v = args.clone();
                if let Callee::Indirect(id) = callee {
                    v.push(*id);
                }
                if let Callee::Interface { receiver, .. } = callee {
                    v.push(*receiver);
                }
                v
            }
            Instr::MakeClosure { captures, .. } => captures.clone(),
            Instr::MakeSlice { len, cap, .. } => {
                len.iter().chain(cap.iter()).copied().collect()
            }
            Instr::Alloc { .. } => vec![],
            Instr::Go { call } | Instr::Defer { call } => vec![*call],
            Instr::Extract { tuple, .. } => vec![*tuple],
            Instr::Return { values } => values.clone(),
            Instr::If { cond, .. } => vec![*cond],
            Instr::Jump { .. } => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub block: BlockId,
    pub kind: Instr,
    pub ty: Type,
    pub referrers: Vec<ValueId>,
    pub pos: Option<Position>,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instrs: Vec<ValueId>,
    pub succs: Vec<BlockId>,
    pub idom: Option<BlockId>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub entry: BlockId,
    pub params: Vec<ValueId>,
    pub free_vars: Vec<ValueId>,
    pub blocks: Vec<Block>,
    pub values: Vec<ValueData>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: 0,
            params: vec![],
            free_vars: vec![],
            blocks: vec![Block::default()],
            values: vec![],
        }
    }

    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(Block::default());
        (self.blocks.len() - 1) as BlockId
    }

    pub fn push(&mut self, block: BlockId, kind: Instr, ty: Type) -> ValueId {
        let id = self.values.len() as ValueId;
        self.values.push(ValueData { block, kind, ty, referrers: vec![], pos: None });
        self.blocks[block as usize].instrs.push(id);
        id
    }

    pub fn push_with_pos(
        &mut self,
        block: BlockId,
        kind: Instr,
        ty: Type,
        pos: Position,
    ) -> ValueId {
        let id = self.push(block, kind, ty);
        self.values[id as usize].pos = Some(pos);
        id
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id as usize]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id as usize]
    }

    /// Populate `referrers` for every value by scanning all instructions'
    /// operands. Call once after the function body is fully built.
    pub fn build_referrers(&mut self) {
        for v in self.values.iter_mut() {
            v.referrers.clear();
        }
        let ops: Vec<(ValueId, Vec<ValueId>)> = self
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as ValueId, v.kind.operands()))
            .collect();
        for (user, operands) in ops {
            for op in operands {
                self.values[op as usize].referrers.push(user);
            }
        }
    }

    /// Set explicit successor edges for a block. Caller-managed because
    /// both branches of `If`/the single target of `Jump` determine them.
    pub fn set_succs(&mut self, block: BlockId, succs: Vec<BlockId>) {
        self.blocks[block as usize].succs = succs;
    }

    pub fn set_idom(&mut self, block: BlockId, idom: Option<BlockId>) {
        self.blocks[block as usize].idom = idom;
    }

    /// Compute immediate dominators for a function whose successor edges
    /// are already set, via the standard iterative reverse-postorder
    /// dataflow (Cooper/Harvey/Kennedy). Exposed so fixtures and an
    /// external driver plugging a CFG without ready-made dominators can
    /// still use the engine; production SSA bundles are expected to
    /// already carry this link per §3.
    pub fn compute_dominators(&mut self) {
        let n = self.blocks.len();
        if n == 0 {
            return;
        }
        let order = self.reverse_postorder();
        let rpo_index: FxHashMap<BlockId, usize> =
            order.iter().enumerate().map(|(i, &b)| (b, i)).collect();
        let preds = self.predecessors();

        let mut idom: Vec<Option<BlockId>> = vec![None; n];
        idom[self.entry as usize] = Some(self.entry);
        let mut changed = true;
        while changed {
            changed = false;
            for &b in order.iter().filter(|&&b| b != self.entry) {
                let mut new_idom: Option<BlockId> = None;
                for &p in &preds[b as usize] {
                    if idom[p as usize].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(cur, p, &idom, &rpo_index),
                    });
                }
                if new_idom != idom[b as usize] {
                    idom[b as usize] = new_idom;
                    changed = true;
                }
            }
        }
        for (b, d) in idom.into_iter().enumerate() {
            let d = if b as BlockId == self.entry { None } else { d };
            self.blocks[b].idom = d;
        }
    }

    fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![vec![]; self.blocks.len()];
        for (b, blk) in self.blocks.iter().enumerate() {
            for &s in &blk.succs {
                preds[s as usize].push(b as BlockId);
            }
        }
        preds
    }

    fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut post = vec![];
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry as usize] = true;
        while let Some((b, i)) = stack.pop() {
            let succs = &self.blocks[b as usize].succs;
            if i < succs.len() {
                let next = succs[i];
                stack.push((b, i + 1));
                if !visited[next as usize] {
                    visited[next as usize] = true;
                    stack.push((next, 0));
                }
            } else {
                post.push(b);
            }
        }
        post.reverse();
        post
    }
}

fn intersect(
    mut a: BlockId,
    mut b: BlockId,
    idom: &[Option<BlockId>],
    rpo: &FxHashMap<BlockId, usize>,
) -> BlockId {
    while a != b {
        while rpo[&a] > rpo[&b] {
            a = idom[a as usize].expect("walked above entry");
        }
        while rpo[&b] > rpo[&a] {
            b = idom[b as usize].expect("walked above entry");
        }
    }
    a
}

/// A whole program: a set of independently analyzed functions plus a
/// name index for direct-call resolution.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    by_name: FxHashMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, f: Function) -> usize {
        let idx = self.functions.len();
        self.by_name.insert(f.name.clone(), idx);
        self.functions.push(f);
        idx
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.by_name.get(name).map(|&i| &self.functions[i])
    }

    pub fn function_by_name_mut(&mut self, name: &str) -> Option<&mut Function> {
        if let Some(&i) = self.by_name.get(name) {
            Some(&mut self.functions[i])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::types::Type;

    fn diamond() -> Function {
        // entry -> (then | else) -> merge
        let mut f = Function::new("diamond");
        let entry = f.entry;
        let then_b = f.add_block();
        let else_b = f.add_block();
        let merge = f.add_block();
        f.push(entry, Instr::Const(Const::Bool(true)), Type::Bool);
        f.set_succs(entry, vec![then_b, else_b]);
        f.set_succs(then_b, vec![merge]);
        f.set_succs(else_b, vec![merge]);
        f.compute_dominators();
        f.blocks.iter_mut().for_each(|_| {});
        let _ = merge;
        f
    }

    #[test]
    fn dominators_diamond() {
        let f = diamond();
        assert_eq!(f.blocks[1].idom, Some(0)); // then dominated by entry
        assert_eq!(f.blocks[2].idom, Some(0)); // else dominated by entry
        assert_eq!(f.blocks[3].idom, Some(0)); // merge dominated by entry, not then/else
    }

    #[test]
    fn referrers_populated() {
        let mut f = Function::new("f");
        let c1 = f.push(0, Instr::Const(Const::Int(1)), Type::Int { signed: true, bits: 64 });
        let c2 = f.push(0, Instr::Const(Const::Int(2)), Type::Int { signed: true, bits: 64 });
        let add = f.push(
            0,
            Instr::BinOp { op: BinOp::Add, a: c1, b: c2 },
            Type::Int { signed: true, bits: 64 },
        );
        f.build_referrers();
        assert_eq!(f.value(c1).referrers, vec![add]);
        assert_eq!(f.value(c2).referrers, vec![add]);
    }
}
