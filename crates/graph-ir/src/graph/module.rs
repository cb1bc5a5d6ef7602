use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::function::{Function, FunctionMut};
use crate::graph::ids::{FunctionId, NodeId, VariableId};
use crate::graph::variable::{InitPolicy, Variable, Visibility};
use crate::types::{ElemKind, Type, TypePool, TypeRef};

/// Reserved delimiter separating a requested name from its uniquing suffix.
///
/// Text at or after the first occurrence in a requested name is discarded by
/// [`Module::unique_name`].
pub const NAME_DELIMITER: &str = "__";

/// Module-wide state shared by every function: the type pool, the variable
/// arena and the identifier and name counters.
#[derive(Debug, Default)]
pub(crate) struct ModuleState {
    pub(crate) types: TypePool,
    pub(crate) variables: BTreeMap<VariableId, Variable>,
    next_variable: u32,
    next_node: u32,
    unique_idx: u64,
}

impl ModuleState {
    pub(crate) fn unique_name(&mut self, requested: &str) -> String {
        let prefix = match requested.find(NAME_DELIMITER) {
            Some(pos) => &requested[..pos],
            None => requested,
        };
        let name = format!("{prefix}{NAME_DELIMITER}{}", self.unique_idx);
        self.unique_idx += 1;
        name
    }

    pub(crate) fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub(crate) fn create_variable(
        &mut self,
        ty: Type,
        name: &str,
        visibility: Visibility,
        init: InitPolicy,
    ) -> VariableId {
        let ty = self.types.intern(ty);
        let id = VariableId(self.next_variable);
        self.next_variable += 1;
        let name = self.unique_name(name);
        debug!(variable = %name, ?visibility, init = init.name(), "created variable");
        self.variables.insert(
            id,
            Variable {
                id,
                name,
                ty,
                visibility,
                init,
                payload: None,
            },
        );
        id
    }

    pub(crate) fn variable(&self, id: VariableId) -> GraphResult<&Variable> {
        self.variables
            .get(&id)
            .ok_or(GraphError::UnknownVariable(id))
    }

    pub(crate) fn erase_variable(&mut self, id: VariableId) -> GraphResult<Variable> {
        let removed = self
            .variables
            .remove(&id)
            .ok_or(GraphError::UnknownVariable(id))?;
        debug!(variable = %removed.name(), "erased variable");
        Ok(removed)
    }
}

/// Graph container: owns the type pool, the persistent variables and the
/// named functions built over them.
///
/// Dropping a module releases every function (and with it their nodes) and
/// then every variable.
#[derive(Debug, Default)]
pub struct Module {
    // Field order is drop order.
    pub(crate) functions: Vec<Function>,
    pub(crate) state: ModuleState,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &TypePool {
        &self.state.types
    }

    /// Resolves a type handle issued by this module's pool.
    pub fn ty(&self, handle: TypeRef) -> &Type {
        self.state.types.get(handle)
    }

    pub fn intern(&mut self, ty: Type) -> TypeRef {
        self.state.types.intern(ty)
    }

    pub fn intern_dims(&mut self, elem: ElemKind, dims: &[usize]) -> TypeRef {
        self.state.types.intern_dims(elem, dims)
    }

    pub fn with_new_shape(&mut self, base: TypeRef, dims: &[usize]) -> TypeRef {
        self.state.types.with_new_shape(base, dims)
    }

    pub fn void_type(&mut self) -> TypeRef {
        self.state.types.void_type()
    }

    /// Derives a unique name from `requested`.
    ///
    /// Everything from the first [`NAME_DELIMITER`] on is dropped, then the
    /// delimiter and the module counter are appended and the counter advances.
    /// Re-uniquing a generated name therefore keeps the original prefix.
    pub fn unique_name(&mut self, requested: &str) -> String {
        self.state.unique_name(requested)
    }

    // --- functions ---

    pub fn has_function(&self, name: &str) -> bool {
        self.function_by_name(name).is_some()
    }

    /// Creates an empty function. Fails when the name is already taken.
    pub fn create_function(&mut self, name: impl Into<String>) -> GraphResult<FunctionId> {
        let name = name.into();
        if self.has_function(&name) {
            return Err(GraphError::DuplicateFunction(name));
        }
        let id = FunctionId(self.functions.len() as u32);
        debug!(function = %name, "created function");
        self.functions.push(Function::new(id, name));
        Ok(id)
    }

    pub fn function(&self, id: FunctionId) -> GraphResult<&Function> {
        self.functions
            .get(id.0 as usize)
            .ok_or(GraphError::UnknownFunction(id))
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Functions in creation order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Opens a function for construction and editing.
    pub fn function_mut(&mut self, id: FunctionId) -> GraphResult<FunctionMut<'_>> {
        let Module { functions, state } = self;
        let function = functions
            .get_mut(id.0 as usize)
            .ok_or(GraphError::UnknownFunction(id))?;
        Ok(FunctionMut::new(state, function))
    }

    // --- variables ---

    /// Interns `ty` and registers a new variable under a uniqued `name`.
    pub fn create_variable(
        &mut self,
        ty: Type,
        name: &str,
        visibility: Visibility,
        init: InitPolicy,
    ) -> VariableId {
        self.state.create_variable(ty, name, visibility, init)
    }

    pub fn create_variable_dims(
        &mut self,
        elem: ElemKind,
        dims: &[usize],
        name: &str,
        visibility: Visibility,
        init: InitPolicy,
    ) -> VariableId {
        self.create_variable(Type::new(elem, dims), name, visibility, init)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_quantized_variable(
        &mut self,
        elem: ElemKind,
        dims: &[usize],
        scale: f32,
        offset: i32,
        name: &str,
        visibility: Visibility,
        init: InitPolicy,
    ) -> VariableId {
        self.create_variable(
            Type::quantized(elem, dims, scale, offset),
            name,
            visibility,
            init,
        )
    }

    pub fn variable(&self, id: VariableId) -> GraphResult<&Variable> {
        self.state.variable(id)
    }

    pub fn variable_mut(&mut self, id: VariableId) -> GraphResult<&mut Variable> {
        self.state
            .variables
            .get_mut(&id)
            .ok_or(GraphError::UnknownVariable(id))
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.state.variables.values().find(|v| v.name() == name)
    }

    /// Variables in creation order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.state.variables.values()
    }

    /// Attaches an opaque payload to a variable.
    pub fn set_payload(&mut self, id: VariableId, bytes: impl Into<Arc<[u8]>>) -> GraphResult<()> {
        self.variable_mut(id)?.set_payload(bytes);
        Ok(())
    }

    /// Removes a variable from the module and returns it.
    ///
    /// Edges that still reference it are reported by the next `verify`.
    pub fn erase_variable(&mut self, id: VariableId) -> GraphResult<Variable> {
        self.state.erase_variable(id)
    }

    /// Verifies every function; the first failure fails the module.
    pub fn verify(&self) -> GraphResult<()> {
        for function in &self.functions {
            crate::graph::verify::verify_function(&self.state, function)?;
        }
        Ok(())
    }

    /// Verifies a single function against this module's variables.
    pub fn verify_function(&self, id: FunctionId) -> GraphResult<()> {
        let function = self.function(id)?;
        crate::graph::verify::verify_function(&self.state, function)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_strips_previous_suffix() {
        let mut module = Module::new();
        let first = module.unique_name("filter");
        assert_eq!(first, "filter__0");
        let again = module.unique_name(&first);
        assert_eq!(again, "filter__1");
        assert_eq!(module.unique_name("bias__7__x"), "bias__2");
    }

    #[test]
    fn duplicate_function_names_are_rejected() {
        let mut module = Module::new();
        module.create_function("main").unwrap();
        let err = module.create_function("main").unwrap_err();
        assert_eq!(err, GraphError::DuplicateFunction("main".to_string()));
    }

    #[test]
    fn erase_variable_releases_it() {
        let mut module = Module::new();
        let v = module.create_variable_dims(
            ElemKind::Float,
            &[4],
            "bias",
            Visibility::Private,
            InitPolicy::Broadcast(0.1),
        );
        assert!(module.erase_variable(v).is_ok());
        assert!(module.variable(v).is_err());
        assert_eq!(
            module.erase_variable(v).unwrap_err(),
            GraphError::UnknownVariable(v)
        );
    }
}
