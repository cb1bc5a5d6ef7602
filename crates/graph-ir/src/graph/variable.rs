use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::ids::VariableId;
use crate::types::{Type, TypeRef};

/// Whether a variable is externally observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Graph input or output, read or written by the caller.
    Public,
    /// Internal parameter such as a weight or bias.
    Private,
}

/// How the variable's payload is initialized before the first run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InitPolicy {
    /// Left untouched.
    None,
    /// Every element set to the given constant.
    Broadcast(f32),
    /// Random fill scaled by the fan-in.
    Xavier(f32),
}

impl InitPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            InitPolicy::None => "none",
            InitPolicy::Broadcast(_) => "broadcast",
            InitPolicy::Xavier(_) => "xavier",
        }
    }

    /// Scalar argument of the policy (fill value or fan-in).
    pub fn arg(&self) -> f32 {
        match self {
            InitPolicy::None => 0.0,
            InitPolicy::Broadcast(value) | InitPolicy::Xavier(value) => *value,
        }
    }
}

/// Persistent storage node (weights, biases, graph inputs and outputs).
///
/// Variables are owned by the module and shared by every function that
/// references them. The payload is an opaque byte buffer that this layer never
/// interprets.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: VariableId,
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) visibility: Visibility,
    pub(crate) init: InitPolicy,
    pub(crate) payload: Option<Arc<[u8]>>,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn init_policy(&self) -> InitPolicy {
        self.init
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn set_payload(&mut self, bytes: impl Into<Arc<[u8]>>) {
        self.payload = Some(bytes.into());
    }

    pub fn clear_payload(&mut self) {
        self.payload = None;
    }

    /// Port name of the single result slot.
    pub fn output_name(&self) -> &'static str {
        "Output"
    }

    /// Multi-line descriptor used by dumps and verification diagnostics.
    pub fn debug_desc(&self, ty: &Type) -> String {
        let visibility = match self.visibility {
            Visibility::Public => "public",
            Visibility::Private => "private",
        };
        format!(
            "Variable\nname : {}\noutput : {}\nvisibility : {}\ninit : {} ({})",
            self.name,
            ty,
            visibility,
            self.init.name(),
            self.init.arg()
        )
    }
}
