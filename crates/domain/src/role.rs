use serde::{Deserialize, Serialize};

use crate::security::{ActionType, FeatureArea, Permission};

/// System roles seeded into every tenant at provisioning time.
///
/// Their permission sets are fixed by policy; role administration may adjust
/// descriptions but never names or grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRole {
    /// Full control over the tenant, including role deletion.
    Owner,
    /// Full control except deleting roles.
    Admin,
    /// Day-to-day work on business records.
    Member,
    /// Read-only access to business records.
    Viewer,
}

impl DefaultRole {
    /// Returns all default roles in seeding order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[DefaultRole] = &[
            DefaultRole::Owner,
            DefaultRole::Admin,
            DefaultRole::Member,
            DefaultRole::Viewer,
        ];

        ALL
    }

    /// Returns the tenant-unique role name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::Member => "Member",
            Self::Viewer => "Viewer",
        }
    }

    /// Returns the seeded role description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Owner => "Full access to every feature area",
            Self::Admin => "Administrative access without role deletion",
            Self::Member => "Create and edit business records",
            Self::Viewer => "Read-only access to business records",
        }
    }

    /// Returns the policy-fixed permission set for this role.
    #[must_use]
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            Self::Owner => Permission::catalog().to_vec(),
            Self::Admin => Permission::catalog()
                .iter()
                .copied()
                .filter(|permission| {
                    *permission != Permission::new(FeatureArea::Roles, ActionType::Delete)
                })
                .collect(),
            Self::Member => Permission::catalog()
                .iter()
                .copied()
                .filter(|permission| {
                    permission.feature_area.is_business_area()
                        && matches!(
                            permission.action,
                            ActionType::View | ActionType::Create | ActionType::Edit
                        )
                })
                .collect(),
            Self::Viewer => Permission::catalog()
                .iter()
                .copied()
                .filter(|permission| {
                    permission.feature_area.is_business_area()
                        && permission.action == ActionType::View
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionType, DefaultRole, FeatureArea, Permission};

    #[test]
    fn every_default_grant_is_in_the_catalog() {
        for role in DefaultRole::all() {
            for permission in role.permissions() {
                assert!(permission.is_seeded(), "{role:?} grants {permission}");
            }
        }
    }

    #[test]
    fn owner_holds_the_full_catalog() {
        assert_eq!(
            DefaultRole::Owner.permissions(),
            Permission::catalog().to_vec()
        );
    }

    #[test]
    fn admin_cannot_delete_roles() {
        let blocked = Permission::new(FeatureArea::Roles, ActionType::Delete);
        assert!(!DefaultRole::Admin.permissions().contains(&blocked));
    }

    #[test]
    fn viewer_only_views_business_areas() {
        for permission in DefaultRole::Viewer.permissions() {
            assert!(permission.feature_area.is_business_area());
            assert_eq!(permission.action, ActionType::View);
        }
    }

    #[test]
    fn default_role_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            DefaultRole::all().iter().map(|role| role.name()).collect();
        assert_eq!(names.len(), DefaultRole::all().len());
    }
}
