use crate::constant_pool::ConstantPool;
use crate::error::{ClassFileError, Result};
use crate::reader::Reader;

/// Header, fields and methods of a class file. Attributes are skipped; descriptors are kept
/// as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub major_version: u16,
    pub access_flags: u16,
    /// Internal name, e.g. `java/util/Map$Entry`.
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFE_BABE {
            return Err(ClassFileError::InvalidMagic(magic));
        }
        let _minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_index = reader.read_u2()?;
        let super_class = if super_index == 0 {
            None
        } else {
            Some(cp.get_class_name(super_index)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields = parse_members(&mut reader, &cp)?;
        let methods = parse_members(&mut reader, &cp)?;
        skip_attributes(&mut reader)?;
        reader.ensure_empty()?;

        Ok(Self {
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
        })
    }
}

fn parse_members(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<ClassMember>> {
    let count = reader.read_u2()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name = cp.get_utf8(reader.read_u2()?)?.to_string();
        let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
        skip_attributes(reader)?;
        members.push(ClassMember {
            access_flags,
            name,
            descriptor,
        });
    }
    Ok(members)
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<()> {
    let count = reader.read_u2()?;
    for _ in 0..count {
        let _name_index = reader.read_u2()?;
        let len = reader.read_u4()? as usize;
        reader.read_bytes(len)?;
    }
    Ok(())
}
