//! JVM access flags and the masks applied when a class is canonicalized.
//!
//! [jvms refer](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.1-200-E.1)

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_VOLATILE: u16 = 0x0040;
pub const ACC_TRANSIENT: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STRICT: u16 = 0x0800;

/// Class bits that take part in the structural id.
pub const CLASS_MASK: u16 = ACC_PUBLIC | ACC_FINAL | ACC_INTERFACE | ACC_ABSTRACT;

/// Field bits that take part in the structural id.
pub const FIELD_MASK: u16 = ACC_PUBLIC
    | ACC_PRIVATE
    | ACC_PROTECTED
    | ACC_STATIC
    | ACC_FINAL
    | ACC_VOLATILE
    | ACC_TRANSIENT;

/// Method bits that take part in the structural id.
pub const METHOD_MASK: u16 = ACC_PUBLIC
    | ACC_PRIVATE
    | ACC_PROTECTED
    | ACC_STATIC
    | ACC_FINAL
    | ACC_SYNCHRONIZED
    | ACC_NATIVE
    | ACC_ABSTRACT
    | ACC_STRICT;

pub const CONSTRUCTOR_NAME: &str = "<init>";
pub const STATIC_INITIALIZER_NAME: &str = "<clinit>";
pub const STATIC_INITIALIZER_DESCRIPTOR: &str = "()V";

#[inline]
pub fn has(flags: u16, bit: u16) -> bool {
    flags & bit != 0
}
