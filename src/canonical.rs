//! Canonical, declaration-order independent encoding of a [`ClassDescriptor`].
//!
//! The output is a stream of `writeUTF` strings (u2 length + modified UTF-8) and
//! `writeInt` integers (big-endian i32):
//!
//! 1. class name
//! 2. class modifiers
//! 3. interface names, sorted
//! 4. per included field, sorted by name: name, modifiers, descriptor
//! 5. `<clinit>`, `static`, `()V` when a static initializer exists
//! 6. per non-private method, constructors first, then by name and descriptor:
//!    name, modifiers, descriptor

use crate::descriptor::{ClassDescriptor, FieldInfo, MethodInfo};
use crate::error::CanonicalError;
use crate::modifiers::{
    self, ACC_ABSTRACT, ACC_INTERFACE, ACC_STATIC, CLASS_MASK, FIELD_MASK, METHOD_MASK,
    STATIC_INITIALIZER_DESCRIPTOR, STATIC_INITIALIZER_NAME,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Which flavour of the canonical form to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// Field descriptors dotted, class modifiers only masked.
    #[default]
    Workbench,
    /// Bit-exact with `java.io.ObjectStreamClass`: field descriptors keep their
    /// slashes, interface `abstract` follows whether any method is declared, and
    /// names compare by UTF-16 code unit.
    Runtime,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grammar::Workbench => write!(f, "workbench"),
            Grammar::Runtime => write!(f, "runtime"),
        }
    }
}

impl FromStr for Grammar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "workbench" => Ok(Grammar::Workbench),
            "runtime" | "jdk" => Ok(Grammar::Runtime),
            other => Err(format!(
                "unknown grammar '{}', expected 'workbench' or 'runtime'",
                other
            )),
        }
    }
}

impl Grammar {
    fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Grammar::Workbench => a.cmp(b),
            Grammar::Runtime => a.encode_utf16().cmp(b.encode_utf16()),
        }
    }

    fn field_descriptor(self, raw: &str) -> String {
        match self {
            Grammar::Workbench => raw.replace('/', "."),
            Grammar::Runtime => raw.to_string(),
        }
    }

    fn class_modifiers(self, desc: &ClassDescriptor) -> u16 {
        let mods = desc.modifiers & CLASS_MASK;
        if self == Grammar::Workbench || !modifiers::has(mods, ACC_INTERFACE) {
            return mods;
        }
        let declares_methods = desc
            .methods
            .iter()
            .any(|m| !m.is_static_initializer && !m.is_constructor);
        if declares_methods {
            mods | ACC_ABSTRACT
        } else {
            mods & !ACC_ABSTRACT
        }
    }
}

/// Equivalent of a `DataOutputStream` restricted to `writeUTF` and `writeInt`.
#[derive(Default)]
struct DataOutput {
    buf: Vec<u8>,
}

impl DataOutput {
    fn write_utf(&mut self, s: &str) -> Result<(), CanonicalError> {
        let encoded = crate::mutf8::encode(s);
        if encoded.len() > MAX_UTF_LEN {
            return Err(CanonicalError::StringTooLong {
                len: encoded.len(),
                preview: s.chars().take(32).collect(),
            });
        }
        self.buf.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        self.buf.extend(encoded);
        Ok(())
    }

    fn write_int(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_member(
        &mut self,
        name: &str,
        mods: u16,
        descriptor: &str,
    ) -> Result<(), CanonicalError> {
        self.write_utf(name)?;
        self.write_int(mods as i32);
        self.write_utf(descriptor)
    }
}

/// Canonical bytes in the default [`Grammar::Workbench`] form.
pub fn canonicalize(desc: &ClassDescriptor) -> Result<Vec<u8>, CanonicalError> {
    canonicalize_with(desc, Grammar::default())
}

pub fn canonicalize_with(
    desc: &ClassDescriptor,
    grammar: Grammar,
) -> Result<Vec<u8>, CanonicalError> {
    let mut out = DataOutput::default();

    out.write_utf(&desc.binary_name)?;
    out.write_int(grammar.class_modifiers(desc) as i32);

    let mut interfaces: Vec<&str> = desc.interfaces.iter().map(String::as_str).collect();
    interfaces.sort_by(|a, b| grammar.compare(a, b));
    for name in interfaces {
        out.write_utf(name)?;
    }

    let mut fields: Vec<&FieldInfo> = desc.fields.iter().filter(|f| !f.is_excluded()).collect();
    fields.sort_by(|a, b| grammar.compare(&a.name, &b.name));
    for field in fields {
        out.write_member(
            &field.name,
            field.modifiers & FIELD_MASK,
            &grammar.field_descriptor(&field.descriptor),
        )?;
    }

    if desc.has_static_initializer() {
        out.write_member(
            STATIC_INITIALIZER_NAME,
            ACC_STATIC,
            STATIC_INITIALIZER_DESCRIPTOR,
        )?;
    }

    let (mut constructors, mut methods): (Vec<&MethodInfo>, Vec<&MethodInfo>) = desc
        .methods
        .iter()
        .filter(|m| !m.is_private() && !m.is_static_initializer)
        .partition(|m| m.is_constructor);
    constructors.sort_by(|a, b| grammar.compare(&a.descriptor, &b.descriptor));
    methods.sort_by(|a, b| {
        grammar
            .compare(&a.name, &b.name)
            .then_with(|| grammar.compare(&a.descriptor, &b.descriptor))
    });
    for method in constructors.into_iter().chain(methods) {
        out.write_member(
            &method.name,
            method.modifiers & METHOD_MASK,
            &method.descriptor.replace('/', "."),
        )?;
    }

    Ok(out.buf)
}
