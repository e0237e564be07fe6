//! Shader program cache

use std::collections::HashMap;

use crate::backend::*;

/// Linked programs keyed by name
#[derive(Debug, Default)]
pub struct ShaderCache {
    programs: HashMap<String, ShaderHandle>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the program for `name`, loading it on first use.
    ///
    /// A program that fails to load is logged and reported as `None`.
    pub fn load_or_reuse<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
    ) -> Option<ShaderHandle> {
        if let Some(handle) = self.programs.get(name) {
            return Some(*handle);
        }
        match backend.load_shader(name) {
            Ok(handle) => {
                log::debug!("Loaded shader '{}'", name);
                self.programs.insert(name.to_string(), handle);
                Some(handle)
            }
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<ShaderHandle> {
        self.programs.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Forget every program. Programs have no explicit destroy in the backend
    /// and go away with its context.
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}
