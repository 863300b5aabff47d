//! Task contexts ("Work", "Health", ...) and the focus blocks they own.

use serde::{Deserialize, Serialize};

use super::ContextId;
use crate::focus::FocusBlock;

/// A named grouping of tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskContext {
    pub id: ContextId,
    pub name: String,
    /// Lower sorts first
    #[serde(default)]
    pub display_order: i32,
    /// Blocks are evaluated in insertion order
    #[serde(default)]
    pub focus_blocks: Vec<FocusBlock>,
}

impl TaskContext {
    pub fn new(id: impl Into<ContextId>, name: impl Into<String>, display_order: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            display_order,
            focus_blocks: Vec::new(),
        }
    }

    /// Attach a block, rebinding it to this context.
    pub fn add_block(&mut self, mut block: FocusBlock) -> &FocusBlock {
        block.context_id = self.id.clone();
        self.focus_blocks.push(block);
        &self.focus_blocks[self.focus_blocks.len() - 1]
    }

    pub fn remove_block(&mut self, block_id: &str) -> Option<FocusBlock> {
        let idx = self.focus_blocks.iter().position(|b| b.id == block_id)?;
        Some(self.focus_blocks.remove(idx))
    }
}

/// Contexts sorted by display order, ties kept in input order.
pub fn ordered(contexts: &[TaskContext]) -> Vec<&TaskContext> {
    let mut sorted: Vec<&TaskContext> = contexts.iter().collect();
    sorted.sort_by_key(|c| c.display_order);
    sorted
}
