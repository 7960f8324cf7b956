use serde_json::Number;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NumC {
    pub saw_int: bool,
    pub saw_float: bool,
}

impl NumC {
    pub(super) fn observe(n: &Number) -> Self {
        if n.is_i64() || n.is_u64() {
            Self { saw_int: true, saw_float: false }
        } else {
            Self { saw_int: false, saw_float: true }
        }
    }

    pub(super) fn join(a: &Self, b: &Self) -> Self {
        Self {
            saw_int: a.saw_int || b.saw_int,
            saw_float: a.saw_float || b.saw_float,
        }
    }

    /// Any fractional sample widens the whole arm to double.
    pub fn is_integer(&self) -> bool {
        !self.saw_float
    }
}
