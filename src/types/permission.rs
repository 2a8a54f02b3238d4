use std::fmt;

use serde::{Deserialize, Serialize};

/// Acts is a bitmask of actions granted on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acts(u32);

impl Acts {
    pub const VIEW: Acts = Acts(1 << 0); // 1
    pub const EDIT: Acts = Acts(1 << 1); // 2
    pub const DELETE: Acts = Acts(1 << 2); // 4

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if this bitmask contains every bit of `required`.
    #[must_use]
    pub const fn has(self, required: Acts) -> bool {
        self.0 & required.0 == required.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn union(self, other: Acts) -> Acts {
        Acts(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Acts) -> Acts {
        Acts(self.0 & !other.0)
    }

    /// Expands to include implied acts: delete implies edit implies view.
    /// Only meaningful for allow bits, never for deny bits.
    #[must_use]
    pub fn expand_implied(self) -> Acts {
        let mut result = self.0;

        if self.has(Self::DELETE) {
            result |= Self::EDIT.0;
        }
        if Acts(result).has(Self::EDIT) {
            result |= Self::VIEW.0;
        }

        Acts(result)
    }

    pub fn parse(s: &str) -> Option<Acts> {
        match s {
            "view" => Some(Self::VIEW),
            "edit" => Some(Self::EDIT),
            "delete" => Some(Self::DELETE),
            _ => None,
        }
    }

    pub fn parse_many<S: AsRef<str>>(strs: &[S]) -> Option<Acts> {
        let mut result = Acts::default();
        for s in strs {
            result = result.union(Self::parse(s.as_ref())?);
        }
        Some(result)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut acts = Vec::new();
        if self.has(Self::VIEW) {
            acts.push("view");
        }
        if self.has(Self::EDIT) {
            acts.push("edit");
        }
        if self.has(Self::DELETE) {
            acts.push("delete");
        }
        acts
    }
}

impl fmt::Display for Acts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<i64> for Acts {
    fn from(bits: i64) -> Self {
        Self(bits as u32)
    }
}

impl From<Acts> for i64 {
    fn from(a: Acts) -> Self {
        a.0 as i64
    }
}
