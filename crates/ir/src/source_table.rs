//! The Source-Entity Table: interns function names, basic-block labels,
//! variable/register names, and line-number annotations so that nodes can
//! refer to them by a single `u32` handle (§3 "Source entities").
//!
//! This is an explicit, owned object passed around by the builder and the
//! graph rather than a process-wide singleton (§9 "Global mutable state").

use crate::entities::{ArrayId, BlockId, FuncId, LabelId, VarId};
use crate::entity::PrimaryMap;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct SourceTable {
    funcs: PrimaryMap<FuncId, String>,
    func_by_name: FxHashMap<String, FuncId>,

    blocks: PrimaryMap<BlockId, (FuncId, String)>,
    block_by_name: FxHashMap<(FuncId, String), BlockId>,

    vars: PrimaryMap<VarId, (FuncId, String)>,
    var_by_name: FxHashMap<(FuncId, String), VarId>,

    labels: PrimaryMap<LabelId, (FuncId, String, u32)>,
    label_by_key: FxHashMap<(FuncId, String, u32), LabelId>,

    arrays: PrimaryMap<ArrayId, String>,
    array_by_name: FxHashMap<String, ArrayId>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_func(&mut self, name: &str) -> FuncId {
        if let Some(&id) = self.func_by_name.get(name) {
            return id;
        }
        let id = self.funcs.push(name.to_string());
        self.func_by_name.insert(name.to_string(), id);
        id
    }

    pub fn func_name(&self, id: FuncId) -> &str {
        &self.funcs[id]
    }

    pub fn intern_block(&mut self, func: FuncId, name: &str) -> BlockId {
        let key = (func, name.to_string());
        if let Some(&id) = self.block_by_name.get(&key) {
            return id;
        }
        let id = self.blocks.push((func, name.to_string()));
        self.block_by_name.insert(key, id);
        id
    }

    pub fn intern_var(&mut self, func: FuncId, name: &str) -> VarId {
        let key = (func, name.to_string());
        if let Some(&id) = self.var_by_name.get(&key) {
            return id;
        }
        let id = self.vars.push((func, name.to_string()));
        self.var_by_name.insert(key, id);
        id
    }

    pub fn var_name(&self, id: VarId) -> &str {
        &self.vars[id].1
    }

    pub fn intern_label(&mut self, func: FuncId, name: &str, line: u32) -> LabelId {
        let key = (func, name.to_string(), line);
        if let Some(&id) = self.label_by_key.get(&key) {
            return id;
        }
        let id = self.labels.push((func, name.to_string(), line));
        self.label_by_key.insert(key, id);
        id
    }

    pub fn intern_array(&mut self, name: &str) -> ArrayId {
        if let Some(&id) = self.array_by_name.get(name) {
            return id;
        }
        let id = self.arrays.push(name.to_string());
        self.array_by_name.insert(name.to_string(), id);
        id
    }

    pub fn array_name(&self, id: ArrayId) -> &str {
        &self.arrays[id]
    }

    pub fn lookup_array(&self, name: &str) -> Option<ArrayId> {
        self.array_by_name.get(name).copied()
    }

    pub fn lookup_func(&self, name: &str) -> Option<FuncId> {
        self.func_by_name.get(name).copied()
    }

    pub fn label_name(&self, id: LabelId) -> &str {
        &self.labels[id].1
    }

    /// Find a label previously captured by [`Self::intern_label`] by
    /// `(function, label)`, ignoring which line it was first seen at. Used
    /// to resolve the config file's symbolic loop references.
    pub fn find_label(&self, func: FuncId, name: &str) -> Option<LabelId> {
        self.labels.iter().find_map(|(id, (f, n, _))| {
            if *f == func && n == name {
                Some(id)
            } else {
                None
            }
        })
    }

    pub fn clear(&mut self) {
        self.funcs.clear();
        self.func_by_name.clear();
        self.blocks.clear();
        self.block_by_name.clear();
        self.vars.clear();
        self.var_by_name.clear();
        self.labels.clear();
        self.label_by_key.clear();
        self.arrays.clear();
        self.array_by_name.clear();
    }
}
