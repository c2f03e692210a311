//! Three-valued evaluation result.

use serde::{Deserialize, Serialize};

/// Result of matching a predicate against one description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    True,
    False,
    /// The predicate could not be evaluated: the selected value is absent,
    /// or the operand is not comparable with it.
    Indeterminate,
}

impl Outcome {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Outcome::True
        } else {
            Outcome::False
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Outcome::True)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Outcome::Indeterminate)
    }

    /// Kleene conjunction: false dominates, then indeterminate.
    pub fn and(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::False, _) | (_, Outcome::False) => Outcome::False,
            (Outcome::Indeterminate, _) | (_, Outcome::Indeterminate) => Outcome::Indeterminate,
            _ => Outcome::True,
        }
    }

    /// Kleene disjunction: true dominates, then indeterminate.
    pub fn or(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::True, _) | (_, Outcome::True) => Outcome::True,
            (Outcome::Indeterminate, _) | (_, Outcome::Indeterminate) => Outcome::Indeterminate,
            _ => Outcome::False,
        }
    }

    /// Closed-world negation: holds whenever `self` does not definitely hold.
    ///
    /// This keeps `NOT(q).search == all - q.search` consistent with `matches`.
    pub fn complement(self) -> Outcome {
        Outcome::from_bool(!self.is_true())
    }

    /// Conjunction of any number of outcomes; empty is `True`.
    pub fn all(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
        let mut result = Outcome::True;
        for outcome in outcomes {
            result = result.and(outcome);
            if result == Outcome::False {
                break;
            }
        }
        result
    }

    /// Disjunction of any number of outcomes; empty is `False`.
    pub fn any(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
        let mut result = Outcome::False;
        for outcome in outcomes {
            result = result.or(outcome);
            if result == Outcome::True {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::*;

    #[test]
    fn test_conjunction_table() {
        assert_eq!(True.and(True), True);
        assert_eq!(True.and(False), False);
        assert_eq!(True.and(Indeterminate), Indeterminate);
        assert_eq!(False.and(Indeterminate), False);
        assert_eq!(Indeterminate.and(Indeterminate), Indeterminate);
    }

    #[test]
    fn test_disjunction_table() {
        assert_eq!(False.or(False), False);
        assert_eq!(False.or(True), True);
        assert_eq!(False.or(Indeterminate), Indeterminate);
        assert_eq!(True.or(Indeterminate), True);
    }

    #[test]
    fn test_complement() {
        assert_eq!(True.complement(), False);
        assert_eq!(False.complement(), True);
        assert_eq!(Indeterminate.complement(), True);
    }

    #[test]
    fn test_folds() {
        assert_eq!(Outcome::all([]), True);
        assert_eq!(Outcome::any([]), False);
        assert_eq!(Outcome::all([True, Indeterminate, True]), Indeterminate);
        assert_eq!(Outcome::any([False, Indeterminate]), Indeterminate);
    }
}
