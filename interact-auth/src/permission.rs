use std::fmt;

use crate::role::Role;

/// Closed set of permissions gating mutating operations. Adding a new
/// permission forces a new arm in [`Permission::allowed_roles`], so the
/// table cannot silently miss an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageRules,
    AdjustPoints,
    ManageBadges,
    ManageUsers,
    ViewAnalytics,
    CreateRecognition,
}

impl Permission {
    /// Roles allowed to exercise this permission.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Permission::ManageRules => &[Role::Owner, Role::Admin],
            Permission::AdjustPoints => &[Role::Owner, Role::Admin],
            Permission::ManageBadges => &[Role::Owner, Role::Admin, Role::Hr],
            Permission::ManageUsers => &[Role::Owner, Role::Admin],
            Permission::ViewAnalytics => &[Role::Owner, Role::Admin, Role::Hr, Role::TeamLead],
            Permission::CreateRecognition => &[
                Role::Owner,
                Role::Admin,
                Role::Hr,
                Role::Ops,
                Role::TeamLead,
                Role::Participant,
            ],
        }
    }

    pub fn allows(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ManageRules => "manage_rules",
            Permission::AdjustPoints => "adjust_points",
            Permission::ManageBadges => "manage_badges",
            Permission::ManageUsers => "manage_users",
            Permission::ViewAnalytics => "view_analytics",
            Permission::CreateRecognition => "create_recognition",
        };
        f.write_str(name)
    }
}
