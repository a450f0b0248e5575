//! Stack operations that rebuild a navigation context on the client.

use serde::{Deserialize, Serialize};

use crate::datum::QueryData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Create,
    Push,
    Clear,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Create => "create",
            FrameKind::Push => "push",
            FrameKind::Clear => "clear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StackOp {
    /// Navigate into a menu or entry by command id.
    PushCommand { command: String },
    /// Bind a session datum. `instance` marks a multi-select binding.
    PushDatum {
        id: String,
        value: String,
        #[serde(default)]
        instance: bool,
    },
    PushQuery(StackQuery),
    Rewind { value: String },
    Mark,
    Jump { url: String },
}

impl StackOp {
    pub fn command(id: impl Into<String>) -> Self {
        StackOp::PushCommand { command: id.into() }
    }

    pub fn datum(id: impl Into<String>, value: impl Into<String>) -> Self {
        StackOp::PushDatum {
            id: id.into(),
            value: value.into(),
            instance: false,
        }
    }

    /// Command id or datum id this operation binds.
    pub fn id(&self) -> Option<&str> {
        match self {
            StackOp::PushCommand { command } => Some(command),
            StackOp::PushDatum { id, .. } => Some(id),
            StackOp::PushQuery(query) => Some(&query.id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackQuery {
    pub id: String,
    pub value: String,
    #[serde(default)]
    pub data: Vec<QueryData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub kind: FrameKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_clause: Option<String>,
    pub ops: Vec<StackOp>,
}

impl StackFrame {
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            if_clause: None,
            ops: Vec::new(),
        }
    }

    pub fn create() -> Self {
        Self::new(FrameKind::Create)
    }

    pub fn push() -> Self {
        Self::new(FrameKind::Push)
    }

    pub fn with_if(mut self, condition: Option<String>) -> Self {
        self.if_clause = condition;
        self
    }

    pub fn with_ops(mut self, ops: Vec<StackOp>) -> Self {
        self.ops = ops;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn commands(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                StackOp::PushCommand { command } => Some(command.as_str()),
                _ => None,
            })
            .collect()
    }
}
