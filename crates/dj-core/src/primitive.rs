use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 8] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Char,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
    ];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "char" => Self::Char,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Char => "char",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// JVM descriptor character.
    pub fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Short => 'S',
            Self::Char => 'C',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.descriptor() == c)
    }

    /// Binary name of the wrapper class.
    pub fn box_class(self) -> &'static str {
        match self {
            Self::Boolean => "java.lang.Boolean",
            Self::Byte => "java.lang.Byte",
            Self::Short => "java.lang.Short",
            Self::Char => "java.lang.Character",
            Self::Int => "java.lang.Integer",
            Self::Long => "java.lang.Long",
            Self::Float => "java.lang.Float",
            Self::Double => "java.lang.Double",
        }
    }

    pub fn from_box_class(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.box_class() == name)
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        self != Self::Boolean
    }

    #[inline]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Char | Self::Int | Self::Long
        )
    }

    /// Widening primitive conversion (JLS 5.1.2), including identity.
    pub fn widens_to(self, to: PrimitiveType) -> bool {
        use PrimitiveType::*;
        if self == to {
            return true;
        }
        match self {
            Byte => matches!(to, Short | Int | Long | Float | Double),
            Short | Char => matches!(to, Int | Long | Float | Double),
            Int => matches!(to, Long | Float | Double),
            Long => matches!(to, Float | Double),
            Float => to == Double,
            Boolean | Double => false,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_follows_java_rules() {
        assert!(PrimitiveType::Char.widens_to(PrimitiveType::Int));
        assert!(!PrimitiveType::Char.widens_to(PrimitiveType::Short));
        assert!(!PrimitiveType::Byte.widens_to(PrimitiveType::Char));
        assert!(PrimitiveType::Long.widens_to(PrimitiveType::Float));
        assert!(!PrimitiveType::Boolean.widens_to(PrimitiveType::Int));
    }

    #[test]
    fn box_class_lookup() {
        assert_eq!(
            PrimitiveType::from_box_class("java.lang.Character"),
            Some(PrimitiveType::Char)
        );
        assert_eq!(PrimitiveType::from_descriptor('J'), Some(PrimitiveType::Long));
    }
}
