use core::fmt;

/// Keys of the `meta` key/value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    /// Unix ms of the last successful refresh.
    LastUpdate,
    /// Unix ms before which refreshes are refused.
    CooldownUntil,
}

impl MetaKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetaKey::LastUpdate => "last_update",
            MetaKey::CooldownUntil => "cooldown_until",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
