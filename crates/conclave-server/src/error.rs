/// User-facing, recoverable session failures. None of these are fatal to
/// the server; each is relayed to the requesting connection as a
/// `JoinError` and leaves state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    RoomNotFound,
    NameTaken,
    HostAlreadyExists,
}

impl SessionError {
    /// The reason string relayed to clients. These are part of the client
    /// contract and must stay stable.
    pub fn message(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "Room not found or no host available.",
            Self::NameTaken => "Username already taken.",
            Self::HostAlreadyExists => "Host already exists for this room.",
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_distinguishable() {
        let all = [
            SessionError::RoomNotFound,
            SessionError::NameTaken,
            SessionError::HostAlreadyExists,
        ];
        for a in &all {
            for b in &all {
                if a != b {
                    assert_ne!(a.message(), b.message());
                }
            }
        }
    }
}
