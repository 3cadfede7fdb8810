use crate::error::{ClassFileError, Result};
use crate::reader::Reader;

#[derive(Debug, Clone)]
enum Entry {
    Utf8(String),
    Class { name_index: u16 },
    /// Any other constant; class-level metadata never needs its value.
    Other,
    /// Second slot of a `long` or `double` constant.
    Unusable,
}

#[derive(Debug, Clone)]
pub(crate) struct ConstantPool {
    entries: Vec<Entry>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        // Index 0 is never valid.
        entries.push(Entry::Unusable);
        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    Entry::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
                }
                3 | 4 => {
                    reader.read_u4()?;
                    Entry::Other
                }
                5 | 6 => {
                    reader.read_u4()?;
                    reader.read_u4()?;
                    entries.push(Entry::Other);
                    Entry::Unusable
                }
                7 => Entry::Class {
                    name_index: reader.read_u2()?,
                },
                8 | 16 | 19 | 20 => {
                    reader.read_u2()?;
                    Entry::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.read_u2()?;
                    reader.read_u2()?;
                    Entry::Other
                }
                15 => {
                    reader.read_u1()?;
                    reader.read_u2()?;
                    Entry::Other
                }
                other => return Err(ClassFileError::InvalidConstantPoolTag(other)),
            };
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Entry> {
        match self.entries.get(index as usize) {
            Some(Entry::Unusable) | None => Err(ClassFileError::InvalidConstantPoolIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Entry::Utf8(s) => Ok(s),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Entry::Class { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
            }),
        }
    }
}

/// Decodes the JVM's modified UTF-8 (two-byte NUL, surrogate pairs as separate
/// three-byte sequences).
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let cont = |b: Option<&u8>| match b {
        Some(b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        _ => Err(ClassFileError::InvalidModifiedUtf8),
    };
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 && b != 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | cont(bytes.get(i + 1))?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push(
                (u16::from(b & 0x0F) << 12)
                    | (cont(bytes.get(i + 1))? << 6)
                    | cont(bytes.get(i + 2))?,
            );
            i += 3;
        } else {
            return Err(ClassFileError::InvalidModifiedUtf8);
        }
    }
    String::from_utf16(&units).map_err(|_| ClassFileError::InvalidModifiedUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_utf8_nul_and_supplementary() {
        assert_eq!(decode_modified_utf8(&[0xC0, 0x80]).unwrap(), "\0");
        assert_eq!(decode_modified_utf8(b"abc").unwrap(), "abc");
        // U+1F600 as a surrogate pair, each half encoded on its own.
        let bytes = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&bytes).unwrap(), "\u{1F600}");
        assert!(decode_modified_utf8(&[0x00]).is_err());
    }
}
