use super::cursor::Cursor;
use crate::error::ReadError;
use crate::mutf8;

const CONSTANT_UTF8: u8 = 1;
const CONSTANT_INTEGER: u8 = 3;
const CONSTANT_FLOAT: u8 = 4;
const CONSTANT_LONG: u8 = 5;
const CONSTANT_DOUBLE: u8 = 6;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_STRING: u8 = 8;
const CONSTANT_FIELDREF: u8 = 9;
const CONSTANT_METHODREF: u8 = 10;
const CONSTANT_INTERFACE_METHODREF: u8 = 11;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHOD_HANDLE: u8 = 15;
const CONSTANT_METHOD_TYPE: u8 = 16;
const CONSTANT_DYNAMIC: u8 = 17;
const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
const CONSTANT_MODULE: u8 = 19;
const CONSTANT_PACKAGE: u8 = 20;

/// Only the entry kinds the structural id needs are kept; the rest are skipped.
/// Utf8 entries stay undecoded until looked up: string literals may hold lone
/// surrogates, which are legal in a class file but not in a Rust `String`.
#[derive(Debug, Clone)]
enum PoolEntry<'a> {
    Utf8(&'a [u8]),
    Class { name_index: u16 },
    Other,
    /// Slot 0 and the upper half of a Long/Double.
    Unusable,
}

#[derive(Debug)]
pub struct ConstantPool<'a> {
    entries: Vec<PoolEntry<'a>>,
}

impl<'a> ConstantPool<'a> {
    pub fn parse(cursor: &mut Cursor<'a>) -> Result<Self, ReadError> {
        let count = cursor.u2()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(PoolEntry::Unusable);

        let mut index: u32 = 1;
        while index < count as u32 {
            let tag = cursor.u1()?;
            let entry = match tag {
                CONSTANT_UTF8 => {
                    let len = cursor.u2()? as usize;
                    PoolEntry::Utf8(cursor.take(len)?)
                }
                CONSTANT_CLASS => PoolEntry::Class {
                    name_index: cursor.u2()?,
                },
                CONSTANT_STRING | CONSTANT_METHOD_TYPE | CONSTANT_MODULE | CONSTANT_PACKAGE => {
                    cursor.skip(2)?;
                    PoolEntry::Other
                }
                CONSTANT_METHOD_HANDLE => {
                    cursor.skip(3)?;
                    PoolEntry::Other
                }
                CONSTANT_INTEGER
                | CONSTANT_FLOAT
                | CONSTANT_FIELDREF
                | CONSTANT_METHODREF
                | CONSTANT_INTERFACE_METHODREF
                | CONSTANT_NAME_AND_TYPE
                | CONSTANT_DYNAMIC
                | CONSTANT_INVOKE_DYNAMIC => {
                    cursor.skip(4)?;
                    PoolEntry::Other
                }
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    cursor.skip(8)?;
                    entries.push(PoolEntry::Other);
                    index += 1;
                    PoolEntry::Unusable
                }
                _ => {
                    return Err(ReadError::UnknownConstantTag {
                        tag,
                        index: index as u16,
                    })
                }
            };
            entries.push(entry);
            index += 1;
        }

        // A Long/Double in the last slot pushes one entry past `count`
        entries.truncate(count.max(1) as usize);
        Ok(Self { entries })
    }

    pub fn utf8(&self, index: u16) -> Result<String, ReadError> {
        match self.entries.get(index as usize) {
            Some(PoolEntry::Utf8(bytes)) => {
                mutf8::decode(bytes).ok_or(ReadError::InvalidUtf8 { index })
            }
            _ => Err(ReadError::BadConstantIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal (slashed) name of a `CONSTANT_Class` entry.
    pub fn class_name(&self, index: u16) -> Result<String, ReadError> {
        match self.entries.get(index as usize) {
            Some(PoolEntry::Class { name_index }) => self.utf8(*name_index),
            _ => Err(ReadError::BadConstantIndex {
                index,
                expected: "Class",
            }),
        }
    }
}
