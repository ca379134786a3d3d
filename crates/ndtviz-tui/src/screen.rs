//! Screen identifiers, in tab-bar order.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenId {
    #[default]
    Topology, // 1
    Counters, // 2
    Skew,     // 3
}

impl ScreenId {
    pub const ALL: [ScreenId; 3] = [Self::Topology, Self::Counters, Self::Skew];

    pub fn number(self) -> u8 {
        match self {
            Self::Topology => 1,
            Self::Counters => 2,
            Self::Skew => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.number() == n)
    }

    /// Next screen in tab order (wraps around).
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous screen in tab order (wraps around).
    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Topology => "Topology",
            Self::Counters => "Counters",
            Self::Skew => "Clock Skew",
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_order_wraps() {
        assert_eq!(ScreenId::Skew.next(), ScreenId::Topology);
        assert_eq!(ScreenId::Topology.prev(), ScreenId::Skew);
        assert_eq!(ScreenId::from_number(2), Some(ScreenId::Counters));
        assert_eq!(ScreenId::from_number(4), None);
    }
}
