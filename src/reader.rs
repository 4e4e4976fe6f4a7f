//! Structural reader: class file bytes -> [`ClassDescriptor`].
//!
//! Only the facts the structural id depends on are extracted. Code, signatures,
//! annotations and every other attribute are skipped by length.
//!
//! ```text
//! ClassFile {
//!     u4 magic; u2 minor_version; u2 major_version;
//!     u2 constant_pool_count; cp_info constant_pool[constant_pool_count-1];
//!     u2 access_flags; u2 this_class; u2 super_class;
//!     u2 interfaces_count; u2 interfaces[interfaces_count];
//!     u2 fields_count; field_info fields[fields_count];
//!     u2 methods_count; method_info methods[methods_count];
//!     u2 attributes_count; attribute_info attributes[attributes_count];
//! }
//! ```

mod constant_pool;
mod cursor;

use crate::descriptor::{ClassDescriptor, FieldInfo, MethodInfo};
use crate::error::ReadError;
use crate::modifiers::CLASS_MASK;
use constant_pool::ConstantPool;
use cursor::Cursor;

pub const MAGIC: u32 = 0xCAFEBABE;
/// JDK 1.1
pub const MIN_SUPPORTED_MAJOR: u16 = 45;
/// JDK 25
pub const MAX_SUPPORTED_MAJOR: u16 = 69;

const INNER_CLASSES: &str = "InnerClasses";

/// Parse one class file. Fails fast; no partial descriptor is ever returned.
pub fn read(bytes: &[u8]) -> Result<ClassDescriptor, ReadError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.u4()?;
    if magic != MAGIC {
        return Err(ReadError::BadMagic(magic));
    }
    let minor = cursor.u2()?;
    let major = cursor.u2()?;
    if !(MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&major) {
        return Err(ReadError::UnsupportedVersion { major, minor });
    }

    let pool = ConstantPool::parse(&mut cursor)?;

    let access_flags = cursor.u2()?;
    let this_class = pool.class_name(cursor.u2()?)?;
    if this_class.is_empty() {
        return Err(ReadError::EmptyClassName);
    }
    let _super_class = cursor.u2()?;

    let interface_count = cursor.u2()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        let name = pool.class_name(cursor.u2()?)?;
        interfaces.push(to_dotted(&name));
    }

    let field_count = cursor.u2()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let (flags, name, descriptor) = read_member(&mut cursor, &pool)?;
        fields.push(FieldInfo::new(name, flags, descriptor));
    }

    let method_count = cursor.u2()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        let (flags, name, descriptor) = read_member(&mut cursor, &pool)?;
        methods.push(MethodInfo::new(name, flags, descriptor));
    }

    let mut declared_flags = None;
    let attribute_count = cursor.u2()?;
    for _ in 0..attribute_count {
        let name = pool.utf8(cursor.u2()?)?;
        let len = cursor.u4()? as usize;
        let body = cursor.take(len)?;
        if name == INNER_CLASSES {
            if let Some(flags) = declared_inner_flags(body, &pool, &this_class)? {
                declared_flags = Some(flags);
            }
        }
    }

    let binary_name = to_dotted(&this_class);
    let modifiers = match declared_flags {
        Some(flags) => {
            tracing::debug!(
                class = %binary_name,
                standalone = access_flags,
                declared = flags,
                "using InnerClasses access flags"
            );
            flags
        }
        None => access_flags,
    };

    Ok(ClassDescriptor {
        binary_name,
        modifiers: modifiers & CLASS_MASK,
        interfaces,
        fields,
        methods,
    })
}

/// `field_info` and `method_info` share one layout.
fn read_member(
    cursor: &mut Cursor<'_>,
    pool: &ConstantPool<'_>,
) -> Result<(u16, String, String), ReadError> {
    let flags = cursor.u2()?;
    let name = pool.utf8(cursor.u2()?)?;
    let descriptor = pool.utf8(cursor.u2()?)?;
    let attribute_count = cursor.u2()?;
    for _ in 0..attribute_count {
        cursor.skip(2)?;
        let len = cursor.u4()? as usize;
        cursor.skip(len)?;
    }
    Ok((flags, name, descriptor))
}

/// Find the `InnerClasses` entry describing `this_class` and return its declared flags.
fn declared_inner_flags(
    body: &[u8],
    pool: &ConstantPool<'_>,
    this_class: &str,
) -> Result<Option<u16>, ReadError> {
    let mut cursor = Cursor::new(body);
    let count = cursor.u2()?;
    for _ in 0..count {
        let inner_class_info = cursor.u2()?;
        let _outer_class_info = cursor.u2()?;
        let _inner_name = cursor.u2()?;
        let inner_flags = cursor.u2()?;
        if inner_class_info != 0 && pool.class_name(inner_class_info)? == this_class {
            return Ok(Some(inner_flags));
        }
    }
    Ok(None)
}

fn to_dotted(internal: &str) -> String {
    internal.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::*;
    use proptest::prelude::*;

    /// Minimal class file writer for reader tests.
    struct ClassBytes {
        pool: Vec<Vec<u8>>,
        major: u16,
        access: u16,
        this_class: u16,
        interfaces: Vec<u16>,
        fields: Vec<(u16, u16, u16)>,
        methods: Vec<(u16, u16, u16)>,
        attributes: Vec<(u16, Vec<u8>)>,
    }

    impl ClassBytes {
        fn new(name: &str, access: u16) -> Self {
            let mut class = Self {
                pool: Vec::new(),
                major: 52,
                access,
                this_class: 0,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            };
            class.this_class = class.class(name);
            class
        }

        fn utf8(&mut self, s: &str) -> u16 {
            let encoded = crate::mutf8::encode(s);
            let mut entry = vec![1];
            entry.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
            entry.extend(encoded);
            self.pool.push(entry);
            self.pool.len() as u16
        }

        /// A `CONSTANT_Utf8` entry with arbitrary content, unreferenced by the class.
        fn raw_utf8(mut self, bytes: &[u8]) -> Self {
            let mut entry = vec![1];
            entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            entry.extend_from_slice(bytes);
            self.pool.push(entry);
            self
        }

        fn class(&mut self, name: &str) -> u16 {
            let name_index = self.utf8(name);
            let mut entry = vec![7];
            entry.extend_from_slice(&name_index.to_be_bytes());
            self.pool.push(entry);
            self.pool.len() as u16
        }

        fn interface(mut self, name: &str) -> Self {
            let index = self.class(name);
            self.interfaces.push(index);
            self
        }

        fn field(mut self, name: &str, flags: u16, descriptor: &str) -> Self {
            let n = self.utf8(name);
            let d = self.utf8(descriptor);
            self.fields.push((flags, n, d));
            self
        }

        fn method(mut self, name: &str, flags: u16, descriptor: &str) -> Self {
            let n = self.utf8(name);
            let d = self.utf8(descriptor);
            self.methods.push((flags, n, d));
            self
        }

        fn inner_class(mut self, inner: &str, outer: &str, simple: &str, flags: u16) -> Self {
            let attr_name = self.utf8("InnerClasses");
            let inner = self.class(inner);
            let outer = self.class(outer);
            let simple = self.utf8(simple);
            let mut body = 1u16.to_be_bytes().to_vec();
            for v in [inner, outer, simple, flags] {
                body.extend_from_slice(&v.to_be_bytes());
            }
            self.attributes.push((attr_name, body));
            self
        }

        fn build(&self) -> Vec<u8> {
            let mut out = MAGIC.to_be_bytes().to_vec();
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&self.major.to_be_bytes());
            out.extend_from_slice(&(self.pool.len() as u16 + 1).to_be_bytes());
            for entry in &self.pool {
                out.extend_from_slice(entry);
            }
            out.extend_from_slice(&self.access.to_be_bytes());
            out.extend_from_slice(&self.this_class.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
            for i in &self.interfaces {
                out.extend_from_slice(&i.to_be_bytes());
            }
            for members in [&self.fields, &self.methods] {
                out.extend_from_slice(&(members.len() as u16).to_be_bytes());
                for (flags, name, descriptor) in members {
                    out.extend_from_slice(&flags.to_be_bytes());
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                    out.extend_from_slice(&0u16.to_be_bytes());
                }
            }
            out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
            for (name, body) in &self.attributes {
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&(body.len() as u32).to_be_bytes());
                out.extend_from_slice(body);
            }
            out
        }
    }

    #[test]
    fn test_read_minimal_class() {
        let bytes = ClassBytes::new("a/Empty", 0x0021).build();
        let desc = read(&bytes).unwrap();
        assert_eq!(desc.binary_name, "a.Empty");
        assert_eq!(desc.modifiers, ACC_PUBLIC);
        assert!(desc.interfaces.is_empty());
        assert!(desc.fields.is_empty());
        assert!(desc.methods.is_empty());
    }

    #[test]
    fn test_read_members_in_declaration_order() {
        let bytes = ClassBytes::new("p/Widget", ACC_PUBLIC)
            .interface("java/lang/Cloneable")
            .interface("java/io/Serializable")
            .field("label", ACC_PRIVATE, "Ljava/lang/String;")
            .field("count", 0, "I")
            .method("<init>", ACC_PUBLIC, "()V")
            .method("<clinit>", ACC_STATIC, "()V")
            .method("count", ACC_PUBLIC, "()I")
            .build();
        let desc = read(&bytes).unwrap();

        assert_eq!(desc.interfaces, vec!["java.lang.Cloneable", "java.io.Serializable"]);
        assert_eq!(desc.fields[0], FieldInfo::new("label", ACC_PRIVATE, "Ljava/lang/String;"));
        assert_eq!(desc.fields[1].name, "count");
        assert_eq!(desc.methods.len(), 3);
        assert!(desc.methods[0].is_constructor);
        assert!(desc.methods[1].is_static_initializer);
        assert_eq!(desc.methods[2].descriptor, "()I");
    }

    #[test]
    fn test_inner_class_flags_replace_standalone_flags() {
        // javac writes a protected nested class as public in its own header
        let bytes = ClassBytes::new("a/Outer$Guarded", 0x0021)
            .inner_class("a/Outer$Guarded", "a/Outer", "Guarded", ACC_PROTECTED | ACC_STATIC)
            .build();
        let desc = read(&bytes).unwrap();
        assert_eq!(desc.binary_name, "a.Outer$Guarded");
        assert_eq!(desc.modifiers, 0);
    }

    #[test]
    fn test_inner_class_entries_for_other_classes_are_ignored() {
        let bytes = ClassBytes::new("a/Outer", 0x0031)
            .inner_class("a/Outer$Nested", "a/Outer", "Nested", ACC_PRIVATE | ACC_STATIC)
            .build();
        let desc = read(&bytes).unwrap();
        assert_eq!(desc.modifiers, ACC_PUBLIC | ACC_FINAL);
    }

    #[test]
    fn test_lone_surrogate_literal_does_not_fail_read() {
        let plain = ClassBytes::new("a/Sur", ACC_PUBLIC)
            .field("x", ACC_PUBLIC, "I")
            .build();
        let with_literal = ClassBytes::new("a/Sur", ACC_PUBLIC)
            .raw_utf8(&[0xED, 0xA0, 0x80])
            .field("x", ACC_PUBLIC, "I")
            .build();
        assert_eq!(read(&with_literal).unwrap(), read(&plain).unwrap());
    }

    #[test]
    fn test_referenced_lone_surrogate_is_malformed() {
        let mut class = ClassBytes::new("a/Sur", ACC_PUBLIC).raw_utf8(&[0xED, 0xA0, 0x80]);
        let bad = class.pool.len() as u16;
        let descriptor = class.utf8("I");
        class.fields.push((ACC_PUBLIC, bad, descriptor));
        assert_eq!(
            read(&class.build()).unwrap_err(),
            ReadError::InvalidUtf8 { index: bad }
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = ClassBytes::new("a/B", 0).build();
        bytes[0] = 0xCB;
        assert_eq!(read(&bytes).unwrap_err(), ReadError::BadMagic(0xCBFEBABE));
    }

    #[test]
    fn test_unsupported_version() {
        let mut class = ClassBytes::new("a/B", 0);
        class.major = 99;
        assert_eq!(
            read(&class.build()).unwrap_err(),
            ReadError::UnsupportedVersion { major: 99, minor: 0 }
        );
        class.major = 44;
        assert!(matches!(
            read(&class.build()),
            Err(ReadError::UnsupportedVersion { major: 44, .. })
        ));
    }

    #[test]
    fn test_every_truncation_fails() {
        let bytes = ClassBytes::new("a/B", ACC_PUBLIC)
            .field("x", 0, "I")
            .method("run", ACC_PUBLIC, "()V")
            .inner_class("a/B", "a/Outer", "B", ACC_PUBLIC)
            .build();
        assert!(read(&bytes).is_ok());
        for len in 0..bytes.len() {
            assert!(
                matches!(read(&bytes[..len]), Err(ReadError::Truncated { .. })),
                "prefix of {} bytes should be truncated",
                len
            );
        }
    }

    #[test]
    fn test_empty_class_name() {
        let bytes = ClassBytes::new("", 0).build();
        assert_eq!(read(&bytes).unwrap_err(), ReadError::EmptyClassName);
    }

    #[test]
    fn test_this_class_must_be_class_entry() {
        let mut class = ClassBytes::new("a/B", 0);
        class.this_class = 1;
        assert_eq!(
            read(&class.build()).unwrap_err(),
            ReadError::BadConstantIndex {
                index: 1,
                expected: "Class"
            }
        );
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut bytes = ClassBytes::new("a/B", ACC_PUBLIC).build();
        bytes.extend_from_slice(&[0xFF; 8]);
        assert_eq!(read(&bytes).unwrap().binary_name, "a.B");
    }

    proptest! {
        #[test]
        fn fuzz_read_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = read(&bytes);
        }

        #[test]
        fn fuzz_read_valid_header_garbage_body(body in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
            bytes.extend(body);
            let _ = read(&bytes);
        }
    }
}
