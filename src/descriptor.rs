//! The structural facts of one class, as consumed by the canonicalizer.
//!
//! Built by [`crate::reader::read`] from class bytes, or directly by a compiler
//! front-end that already knows the class layout (and has resolved nested-class
//! modifiers itself).

use crate::error::CoreError;
use crate::modifiers::{self, CONSTRUCTOR_NAME, STATIC_INITIALIZER_NAME};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Dotted binary name, e.g. `a.b.Outer$Inner`.
    pub binary_name: String,
    /// Declared class modifiers, already limited to public/final/interface/abstract.
    pub modifiers: u16,
    /// Dotted interface names in declaration order.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    /// Raw access flags as read.
    pub modifiers: u16,
    /// Raw field descriptor, e.g. `I` or `Ljava/lang/String;`.
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub modifiers: u16,
    /// Raw method descriptor, e.g. `(Ljava/lang/String;)V`.
    pub descriptor: String,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub is_static_initializer: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, modifiers: u16, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers,
            descriptor: descriptor.into(),
        }
    }

    /// Private fields that are also static or transient never reach the canonical form.
    pub fn is_excluded(&self) -> bool {
        modifiers::has(self.modifiers, modifiers::ACC_PRIVATE)
            && modifiers::has(
                self.modifiers,
                modifiers::ACC_STATIC | modifiers::ACC_TRANSIENT,
            )
    }
}

impl MethodInfo {
    /// Derives the constructor / static-initializer markers from `name`.
    pub fn new(name: impl Into<String>, modifiers: u16, descriptor: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            is_constructor: name == CONSTRUCTOR_NAME,
            is_static_initializer: name == STATIC_INITIALIZER_NAME,
            name,
            modifiers,
            descriptor: descriptor.into(),
        }
    }

    pub fn is_private(&self) -> bool {
        modifiers::has(self.modifiers, modifiers::ACC_PRIVATE)
    }
}

impl ClassDescriptor {
    pub fn new(binary_name: impl Into<String>, modifiers: u16) -> Self {
        Self {
            binary_name: binary_name.into(),
            modifiers: modifiers & modifiers::CLASS_MASK,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    pub fn has_static_initializer(&self) -> bool {
        self.methods.iter().any(|m| m.is_static_initializer)
    }

    /// Check the binary name invariant for descriptors that did not come from the reader.
    pub fn validate(&self) -> Result<(), CoreError> {
        let name = &self.binary_name;
        if name.is_empty() {
            return Err(CoreError::InvalidDescriptor("empty binary name".to_string()));
        }
        if name.contains('/') {
            return Err(CoreError::InvalidDescriptor(format!(
                "binary name '{}' must be dotted, not slashed",
                name
            )));
        }
        if name.split('.').any(str::is_empty) {
            return Err(CoreError::InvalidDescriptor(format!(
                "binary name '{}' has an empty segment",
                name
            )));
        }
        for method in &self.methods {
            if method.is_constructor != (method.name == CONSTRUCTOR_NAME)
                || method.is_static_initializer != (method.name == STATIC_INITIALIZER_NAME)
            {
                return Err(CoreError::InvalidDescriptor(format!(
                    "method '{}' has inconsistent constructor/initializer markers",
                    method.name
                )));
            }
        }
        Ok(())
    }
}
