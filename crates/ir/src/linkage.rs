use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Linkage of symbols.
pub enum Linkage {
    /// The symbol is defined in the module, and can be used from the outside of the module.
    Public,

    #[default]
    /// The symbol is defined in the module, and can NOT be called from another module.
    Private,

    /// The symbol is defined outside of the module. Functions with this
    /// linkage never have a visible body.
    External,
}

impl Linkage {
    pub fn is_external(self) -> bool {
        self == Self::External
    }

    /// Returns `true` if a symbol with this linkage is defined in the module.
    pub fn has_definition(self) -> bool {
        !self.is_external()
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::External => write!(f, "external"),
        }
    }
}

impl FromStr for Linkage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "external" => Ok(Self::External),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_has_no_definition() {
        assert!(!Linkage::External.has_definition());
        assert!(Linkage::Private.has_definition());
        assert!(Linkage::Public.has_definition());
    }

    #[test]
    fn parse_linkage() {
        assert_eq!("external".parse(), Ok(Linkage::External));
        assert_eq!(Linkage::default(), Linkage::Private);
        assert!("weak".parse::<Linkage>().is_err());
    }
}
