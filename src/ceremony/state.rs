#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        })
    }
}

/// Where the client's current (or most recent) ceremony stands.
///
/// `Idle → Building → AwaitingVerification → Completed | Cancelled`. The
/// terminal states are kept until the next ceremony starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyState {
    Idle,
    Building(CeremonyKind),
    AwaitingVerification(CeremonyKind),
    Completed { kind: CeremonyKind, success: bool },
    Cancelled(CeremonyKind),
}

impl CeremonyState {
    pub fn in_flight(&self) -> bool {
        matches!(self, Self::Building(_) | Self::AwaitingVerification(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Cancelled(_))
    }

    /// Whether `next` is a legal successor. Only forward moves are allowed;
    /// a terminal or idle state may only start a new ceremony.
    pub fn can_advance_to(&self, next: &CeremonyState) -> bool {
        use CeremonyState::*;
        match (self, next) {
            (Idle | Completed { .. } | Cancelled(_), Building(_)) => true,
            (Building(a), AwaitingVerification(b)) => a == b,
            (Building(a), Completed { kind: b, success: false }) => a == b,
            (AwaitingVerification(a), Completed { kind: b, .. }) => a == b,
            (AwaitingVerification(a), Cancelled(b)) => a == b,
            _ => false,
        }
    }
}
