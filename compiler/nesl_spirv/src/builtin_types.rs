//! Built-in type resolver.
//!
//! Platform-dependent representations name a SPIR-V type shape with
//! backtick-separated arguments. Widths and signedness are taken literally.
//! Every shape is interned through the compiler's built-in type registry, so
//! resolving the same shape twice declares it once.

use crate::types::{SpirVType, TypeKey};
use crate::{CompileError, Result, SpirVCompiler};
use nesl_ir::NeslType;
use smallvec::SmallVec;
use spirv::StorageClass;

pub(crate) struct BuiltInTypes<'c, 'a> {
    compiler: &'c SpirVCompiler<'a>,
}

impl<'a> SpirVCompiler<'a> {
    pub(crate) fn built_ins(&self) -> BuiltInTypes<'_, 'a> {
        BuiltInTypes { compiler: self }
    }
}

impl BuiltInTypes<'_, '_> {
    /// Resolve a SPIR-V target name such as ``OpTypeVector`System.Float32`4``.
    /// Names without a resolver case yield `Ok(None)`.
    pub(crate) fn try_get_type_by_name(
        &self,
        nesl_type: &NeslType,
        name: &str,
    ) -> Result<Option<SpirVType>> {
        let args: SmallVec<[&str; 4]> = name.split('`').collect();
        let unsupported = || CompileError::UnsupportedBuiltInType {
            type_name: nesl_type.full_name.clone(),
            representation: name.to_string(),
        };
        let arg = |index: usize| args.get(index).copied().ok_or_else(unsupported);
        let number = |index: usize| {
            arg(index).and_then(|a| a.parse::<u32>().map_err(|_| unsupported()))
        };

        let resolved = match args[0] {
            "OpTypeVoid" => self.void()?,
            "OpTypeInt" => self.int(number(1)?, number(2)? != 0)?,
            "OpTypeFloat" => self.float(number(1)?)?,
            "OpTypeVector" => {
                let element = self
                    .compiler
                    .assembly
                    .find_type(arg(1)?)
                    .ok_or_else(unsupported)?;
                let element = self.compiler.get_spirv_type(Some(element.id))?;
                self.vector(element, number(2)?)?
            }
            _ => return Ok(None),
        };
        Ok(Some(resolved))
    }

    fn intern(&self, key: TypeKey) -> Result<SpirVType> {
        let compiler = self.compiler;
        compiler
            .built_in_types
            .get_or_try_insert_with(&key, &compiler.tracker, || {
                let id = compiler.declare(key.opcode(), |id| key.operands(id));
                tracing::debug!(?id, ?key, "declared built-in type");
                Ok(SpirVType { id })
            })
    }

    pub(crate) fn void(&self) -> Result<SpirVType> {
        self.intern(TypeKey::Void)
    }

    pub(crate) fn int(&self, width: u32, signed: bool) -> Result<SpirVType> {
        self.intern(TypeKey::Int { width, signed })
    }

    pub(crate) fn float(&self, width: u32) -> Result<SpirVType> {
        self.intern(TypeKey::Float { width })
    }

    pub(crate) fn vector(&self, element: SpirVType, size: u32) -> Result<SpirVType> {
        self.intern(TypeKey::Vector {
            element: element.id,
            size,
        })
    }

    pub(crate) fn pointer(&self, storage: StorageClass, pointee: SpirVType) -> Result<SpirVType> {
        self.intern(TypeKey::Pointer {
            storage,
            pointee: pointee.id,
        })
    }

    pub(crate) fn function(
        &self,
        return_type: SpirVType,
        parameters: &[SpirVType],
    ) -> Result<SpirVType> {
        self.intern(TypeKey::Function {
            return_type: return_type.id,
            parameters: parameters.iter().map(|p| p.id).collect(),
        })
    }
}
