use std::fmt;

use serde::{Deserialize, Serialize};

/// Java modifier flags, stored with the same bit layout as class-file access flags so
/// declarations parsed from source and members loaded from `.class` files share one
/// representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const PUBLIC: Modifiers = Modifiers(0x0001);
    pub const PRIVATE: Modifiers = Modifiers(0x0002);
    pub const PROTECTED: Modifiers = Modifiers(0x0004);
    pub const STATIC: Modifiers = Modifiers(0x0008);
    pub const FINAL: Modifiers = Modifiers(0x0010);
    pub const SYNCHRONIZED: Modifiers = Modifiers(0x0020);
    pub const VOLATILE: Modifiers = Modifiers(0x0040);
    pub const BRIDGE: Modifiers = Modifiers(0x0040);
    pub const TRANSIENT: Modifiers = Modifiers(0x0080);
    pub const VARARGS: Modifiers = Modifiers(0x0080);
    pub const NATIVE: Modifiers = Modifiers(0x0100);
    pub const INTERFACE: Modifiers = Modifiers(0x0200);
    pub const ABSTRACT: Modifiers = Modifiers(0x0400);
    pub const STRICTFP: Modifiers = Modifiers(0x0800);
    pub const SYNTHETIC: Modifiers = Modifiers(0x1000);
    /// Interface `default` methods. Not a class-file flag; uses a bit javac leaves unused
    /// on methods.
    pub const DEFAULT: Modifiers = Modifiers(0x8000);

    #[inline]
    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    #[inline]
    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    #[inline]
    pub const fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    #[inline]
    pub const fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    #[inline]
    pub const fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    #[inline]
    pub const fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    #[inline]
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    #[inline]
    pub const fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    /// Neither public, protected nor private.
    #[inline]
    pub const fn is_package_private(self) -> bool {
        self.0 & (Self::PUBLIC.0 | Self::PROTECTED.0 | Self::PRIVATE.0) == 0
    }

    /// Source keyword for a single modifier flag, if any.
    pub fn keyword(flag: Modifiers) -> Option<&'static str> {
        Some(match flag {
            Self::PUBLIC => "public",
            Self::PRIVATE => "private",
            Self::PROTECTED => "protected",
            Self::STATIC => "static",
            Self::FINAL => "final",
            Self::SYNCHRONIZED => "synchronized",
            Self::VOLATILE => "volatile",
            Self::TRANSIENT => "transient",
            Self::NATIVE => "native",
            Self::ABSTRACT => "abstract",
            Self::STRICTFP => "strictfp",
            Self::DEFAULT => "default",
            _ => return None,
        })
    }

    pub fn from_keyword(keyword: &str) -> Option<Modifiers> {
        Some(match keyword {
            "public" => Self::PUBLIC,
            "private" => Self::PRIVATE,
            "protected" => Self::PROTECTED,
            "static" => Self::STATIC,
            "final" => Self::FINAL,
            "synchronized" => Self::SYNCHRONIZED,
            "volatile" => Self::VOLATILE,
            "transient" => Self::TRANSIENT,
            "native" => Self::NATIVE,
            "abstract" => Self::ABSTRACT,
            "strictfp" => Self::STRICTFP,
            "default" => Self::DEFAULT,
            _ => return None,
        })
    }
}

impl fmt::Debug for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ORDER: [Modifiers; 10] = [
            Modifiers::PUBLIC,
            Modifiers::PROTECTED,
            Modifiers::PRIVATE,
            Modifiers::ABSTRACT,
            Modifiers::STATIC,
            Modifiers::FINAL,
            Modifiers::TRANSIENT,
            Modifiers::NATIVE,
            Modifiers::SYNCHRONIZED,
            Modifiers::DEFAULT,
        ];
        let words: Vec<&str> = ORDER
            .iter()
            .filter(|flag| self.contains(**flag))
            .filter_map(|flag| Modifiers::keyword(*flag))
            .collect();
        write!(f, "Modifiers({})", words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_roundtrip_and_package_private() {
        let mut m = Modifiers::from_keyword("public").unwrap();
        m.insert(Modifiers::from_keyword("static").unwrap());
        assert!(m.is_public() && m.is_static());
        assert!(!m.is_package_private());
        assert!(Modifiers::FINAL.is_package_private());
        assert_eq!(format!("{m:?}"), "Modifiers(public static)");
    }
}
