//! The result types `spec.md` §3 and §4.7 define: [`Complexity`], the
//! matching-time class a checker decided on, and [`Diagnostics`], the
//! outward-facing verdict a checker (or [`crate::hybrid`]) returns.

use crate::error::Checker;
use crate::witness::Witness;
use reguard_chars::UChar;

/// `Constant | Linear | Polynomial(degree ≥ 2, Witness) | Exponential(Witness)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Complexity {
    Constant,
    Linear,
    Polynomial(u32, Witness<UChar>),
    Exponential(Witness<UChar>),
}

impl Complexity {
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, Complexity::Polynomial(_, _) | Complexity::Exponential(_))
    }

    pub fn witness(&self) -> Option<&Witness<UChar>> {
        match self {
            Complexity::Constant | Complexity::Linear => None,
            Complexity::Polynomial(_, w) | Complexity::Exponential(w) => Some(w),
        }
    }

    /// `None` for `Exponential` (the formulas of §4.4 treat it
    /// separately), `Some(k)` for `Polynomial(k, _)`.
    pub fn degree(&self) -> Option<u32> {
        match self {
            Complexity::Polynomial(k, _) => Some(*k),
            _ => None,
        }
    }
}

/// `Safe(complexity?, checker) | Vulnerable(attack, complexity?, checker)
/// | Unknown(errorKind)`.
#[derive(Debug, Clone)]
pub enum Diagnostics {
    Safe { complexity: Option<Complexity>, checker: Checker },
    Vulnerable { attack: Vec<UChar>, complexity: Option<Complexity>, checker: Checker },
    Unknown { error: String },
}

impl Diagnostics {
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, Diagnostics::Vulnerable { .. })
    }

    pub fn checker(&self) -> Option<Checker> {
        match self {
            Diagnostics::Safe { checker, .. } | Diagnostics::Vulnerable { checker, .. } => {
                Some(*checker)
            }
            Diagnostics::Unknown { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_is_vulnerable() {
        let c = Complexity::Exponential(Witness { pumps: vec![], suffix: vec![] });
        assert!(c.is_vulnerable());
        assert_eq!(c.degree(), None);
    }

    #[test]
    fn polynomial_reports_its_degree() {
        let c = Complexity::Polynomial(3, Witness { pumps: vec![], suffix: vec![] });
        assert!(c.is_vulnerable());
        assert_eq!(c.degree(), Some(3));
    }

    #[test]
    fn constant_and_linear_are_safe() {
        assert!(!Complexity::Constant.is_vulnerable());
        assert!(!Complexity::Linear.is_vulnerable());
    }
}
