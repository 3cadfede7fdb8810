use dj_core::PrimitiveType;
use dj_types::Type;

use crate::error::{ClassFileError, Result};

/// Converts an internal name (`java/util/Map$Entry`) to a binary name.
pub fn internal_to_binary(internal: &str) -> String {
    internal.replace('/', ".")
}

pub fn parse_field_descriptor(desc: &str) -> Result<Type> {
    let (ty, rest) = parse_field_type(desc)?;
    if !rest.is_empty() {
        return Err(ClassFileError::InvalidDescriptor(desc.to_string()));
    }
    Ok(ty)
}

/// Parses `(params)return` into parameter and return types.
pub fn parse_method_descriptor(desc: &str) -> Result<(Vec<Type>, Type)> {
    let invalid = || ClassFileError::InvalidDescriptor(desc.to_string());
    let mut rest = desc.strip_prefix('(').ok_or_else(invalid)?;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(invalid());
        }
        let (param, after) = parse_field_type(rest)?;
        params.push(param);
        rest = after;
    }
    let return_ty = if rest == "V" {
        Type::Void
    } else {
        parse_field_descriptor(rest).map_err(|_| invalid())?
    };
    Ok((params, return_ty))
}

fn parse_field_type(input: &str) -> Result<(Type, &str)> {
    let invalid = || ClassFileError::InvalidDescriptor(input.to_string());
    let first = input.chars().next().ok_or_else(invalid)?;
    if let Some(p) = PrimitiveType::from_descriptor(first) {
        return Ok((Type::Primitive(p), &input[1..]));
    }
    match first {
        'L' => {
            let end = input.find(';').ok_or_else(invalid)?;
            let name = internal_to_binary(&input[1..end]);
            Ok((Type::class(name, Vec::new()), &input[end + 1..]))
        }
        '[' => {
            let (component, rest) = parse_field_type(&input[1..])?;
            Ok((Type::array(component), rest))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_descriptors() {
        assert_eq!(parse_field_descriptor("I").unwrap(), Type::INT);
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/String;").unwrap(),
            Type::array(Type::array(Type::string()))
        );
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_field_descriptor("II").is_err());
    }

    #[test]
    fn method_descriptors() {
        let (params, ret) = parse_method_descriptor("(ILjava/util/Map$Entry;)[J").unwrap();
        assert_eq!(
            params,
            vec![Type::INT, Type::class("java.util.Map$Entry", Vec::new())]
        );
        assert_eq!(ret, Type::array(Type::LONG));
        assert_eq!(parse_method_descriptor("()V").unwrap(), (Vec::new(), Type::Void));
        assert!(parse_method_descriptor("(I").is_err());
    }
}
