//! Functions keyed by method and concrete parameter binding.

use crate::il::IlCompiler;
use crate::types::SpirVType;
use crate::{CompileError, Result, SpirVCompiler, SpirVId};
use nesl_ir::{MethodId, NeslMethod, TypeId};
use smallvec::SmallVec;
use std::sync::Arc;

/// Identity of a compiled function.
///
/// `parameters` holds the concrete type of every effective parameter. For a
/// non-generic method these are the declared types; a generic parameter is
/// replaced by the argument type at the call site, so one generic method
/// yields one function per distinct binding. Every parameter is passed
/// dynamically at the call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    pub method: MethodId,
    pub parameters: SmallVec<[TypeId; 4]>,
}

impl FunctionKey {
    /// Key of a method with its declared signature.
    pub fn for_method(method: &NeslMethod) -> Self {
        FunctionKey {
            method: method.id,
            parameters: method.effective_parameter_types().collect(),
        }
    }
}

#[derive(Debug)]
pub struct SpirVFunction {
    pub id: SpirVId,
    pub key: FunctionKey,
    pub return_type: SpirVType,
    /// `OpFunction` through `OpFunctionEnd`.
    pub(crate) body: Vec<u32>,
    /// Functions called from the body, in call order.
    pub(crate) callees: Vec<Arc<SpirVFunction>>,
}

/// Substitution of generic parameters by concrete types for one function.
#[derive(Default)]
pub(crate) struct Specialization {
    bindings: SmallVec<[(TypeId, TypeId); 2]>,
}

impl Specialization {
    /// Bind generic parameters of `method`'s signature to the key's types.
    /// The key carries one type per effective parameter.
    pub(crate) fn bind(
        compiler: &SpirVCompiler<'_>,
        method: &NeslMethod,
        key: &FunctionKey,
    ) -> Result<Self> {
        let mut specialization = Specialization::default();
        for (declared, &concrete) in method.effective_parameter_types().zip(&key.parameters) {
            let declared_type = compiler.nesl_type(declared)?;
            if !declared_type.is_generic_parameter() {
                continue;
            }
            match specialization.lookup(declared) {
                Some(bound) if bound != concrete => {
                    return Err(CompileError::ConflictingGenericBinding {
                        method: method.full_name.clone(),
                        parameter: declared_type.full_name.clone(),
                    });
                }
                Some(_) => {}
                None => specialization.bindings.push((declared, concrete)),
            }
        }
        Ok(specialization)
    }

    fn lookup(&self, generic: TypeId) -> Option<TypeId> {
        self.bindings
            .iter()
            .find_map(|&(from, to)| (from == generic).then_some(to))
    }

    /// Concrete type for a declared type; unbound generics stay as they are
    /// and fail when resolved.
    pub(crate) fn apply(&self, declared: TypeId) -> TypeId {
        self.lookup(declared).unwrap_or(declared)
    }
}

impl SpirVCompiler<'_> {
    /// The function for `key`, materializing it (and, transitively, every
    /// function it calls) on first request.
    pub(crate) fn get_spirv_function(&self, key: &FunctionKey) -> Result<Arc<SpirVFunction>> {
        self.functions
            .get_or_try_insert_with(key, &self.tracker, || {
                let method = self.method(key.method)?;
                self.build_function(method, key).map(Arc::new)
            })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(method = %method.full_name))]
    fn build_function(&self, method: &NeslMethod, key: &FunctionKey) -> Result<SpirVFunction> {
        let specialization = Specialization::bind(self, method, key)?;
        let function = IlCompiler::new(self, method, specialization).compile(key.clone())?;
        tracing::debug!(id = ?function.id, words = function.body.len(), "materialized function");
        Ok(function)
    }
}
