use serde::{Deserialize, Serialize};

use interact_store::UserRecord;

/// Effective role of a caller, computed once per request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Hr,
    Ops,
    TeamLead,
    Participant,
}

/// Configured owner allow-list. An empty list means nobody resolves to
/// [`Role::Owner`], so owner-gated operations always fail.
#[derive(Debug, Clone, Default)]
pub struct OwnerList {
    emails: Vec<String>,
}

impl OwnerList {
    pub fn new(emails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            emails: emails
                .into_iter()
                .map(|email| email.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        let email = email.to_ascii_lowercase();
        self.emails.iter().any(|owner| owner == &email)
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl Role {
    /// Resolves the effective role from a raw identity row.
    ///
    /// Priority: owner allow-list, then the admin role flag, then the
    /// hr/ops/team_lead type flags, then participant.
    pub fn resolve(user: &UserRecord, owners: &OwnerList) -> Role {
        if owners.contains(&user.email) {
            return Role::Owner;
        }

        if user.role.as_deref() == Some("admin") {
            return Role::Admin;
        }

        if user.role.as_deref() == Some("hr") || user.user_type.as_deref() == Some("hr") {
            return Role::Hr;
        }

        match user.user_type.as_deref() {
            Some("ops") => Role::Ops,
            Some("team_lead") => Role::TeamLead,
            _ => Role::Participant,
        }
    }
}
