/// Who the engine is mining for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    /// No signed-in user. State is kept locally but mining cannot start.
    #[default]
    Anonymous,
    Authenticated {
        user_id: String,
    },
}

impl Session {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self::Authenticated {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { user_id } => Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}
