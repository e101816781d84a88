//! Named SPIR-V assembly sources and the binaries assembled from them.

use crate::error::HarnessError;
use spirv_tools::TargetEnv;
use spirv_tools::assembler::{self, Assembler, AssemblerOptions};
use spirv_tools::val::{self, Validator};
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct SourceCollections {
    spirv_asm_sources: BTreeMap<String, String>,
}

impl SourceCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        assembly: impl Into<String>,
    ) -> Result<(), HarnessError> {
        let name = name.into();
        if self.spirv_asm_sources.contains_key(&name) {
            return Err(HarnessError::DuplicateProgram { name });
        }
        self.spirv_asm_sources.insert(name, assembly.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.spirv_asm_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spirv_asm_sources.is_empty()
    }
}

/// Assembled SPIR-V module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBinary {
    words: Vec<u32>,
}

impl ProgramBinary {
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

#[derive(Debug, Default)]
pub struct BinaryCollection {
    binaries: BTreeMap<String, ProgramBinary>,
}

impl BinaryCollection {
    /// Assembles every source, and validates it when `validate` is set.
    pub fn build(
        sources: &SourceCollections,
        target_env: TargetEnv,
        validate: bool,
    ) -> Result<Self, HarnessError> {
        let assembler = assembler::create(Some(target_env));
        let validator = validate.then(|| val::create(Some(target_env)));

        let mut binaries = BTreeMap::new();
        for (name, text) in &sources.spirv_asm_sources {
            trace!("Assembling program '{}'", name);
            let binary = assembler
                .assemble(text, AssemblerOptions::default())
                .map_err(|e| HarnessError::Assembly {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let words = binary.as_words().to_vec();

            if let Some(validator) = &validator {
                validator
                    .validate(words.as_slice(), None)
                    .map_err(|e| HarnessError::Validation {
                        name: name.clone(),
                        message: e.to_string(),
                    })?;
            }

            debug!("Program '{}' assembled to {} words", name, words.len());
            binaries.insert(name.clone(), ProgramBinary { words });
        }
        Ok(Self { binaries })
    }

    pub fn get(&self, name: &str) -> Result<&ProgramBinary, HarnessError> {
        self.binaries
            .get(name)
            .ok_or_else(|| HarnessError::MissingProgram {
                name: name.to_owned(),
            })
    }
}
