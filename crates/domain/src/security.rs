use std::fmt::{Display, Formatter};
use std::str::FromStr;

use opsgrid_core::AppError;
use serde::{Deserialize, Serialize};

/// Capability domains guarded by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureArea {
    /// Client records.
    Clients,
    /// Deal records.
    Deals,
    /// Invoice records.
    Invoices,
    /// Project records.
    Projects,
    /// Role and assignment administration.
    Roles,
    /// Audit log read surface.
    Audit,
}

impl FeatureArea {
    /// Returns a stable storage value for this feature area.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Deals => "deals",
            Self::Invoices => "invoices",
            Self::Projects => "projects",
            Self::Roles => "roles",
            Self::Audit => "audit",
        }
    }

    /// Returns all known feature areas.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[FeatureArea] = &[
            FeatureArea::Clients,
            FeatureArea::Deals,
            FeatureArea::Invoices,
            FeatureArea::Projects,
            FeatureArea::Roles,
            FeatureArea::Audit,
        ];

        ALL
    }

    /// Returns whether this area holds tenant-owned business records.
    #[must_use]
    pub fn is_business_area(&self) -> bool {
        matches!(
            self,
            Self::Clients | Self::Deals | Self::Invoices | Self::Projects
        )
    }
}

impl FromStr for FeatureArea {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "clients" => Ok(Self::Clients),
            "deals" => Ok(Self::Deals),
            "invoices" => Ok(Self::Invoices),
            "projects" => Ok(Self::Projects),
            "roles" => Ok(Self::Roles),
            "audit" => Ok(Self::Audit),
            _ => Err(AppError::Validation(format!(
                "unknown feature area '{value}'"
            ))),
        }
    }
}

/// Action kinds applied to a feature area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Read an existing resource.
    View,
    /// Create a new resource.
    Create,
    /// Mutate an existing resource.
    Edit,
    /// Remove an existing resource.
    Delete,
    /// Bulk-read a tenant's resources for export.
    Export,
}

impl ActionType {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view" => Ok(Self::View),
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "export" => Ok(Self::Export),
            _ => Err(AppError::Validation(format!("unknown action '{value}'"))),
        }
    }
}

/// A capability as the pair of feature area and action.
///
/// Only pairs present in [`Permission::catalog`] are grantable; everything
/// else denies. The catalog changes at deployment time, never at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    /// Capability domain.
    pub feature_area: FeatureArea,
    /// Action within the domain.
    pub action: ActionType,
}

impl Permission {
    /// Creates a permission pair. The pair may still be outside the catalog.
    #[must_use]
    pub const fn new(feature_area: FeatureArea, action: ActionType) -> Self {
        Self {
            feature_area,
            action,
        }
    }

    /// Returns the seeded permission catalog.
    ///
    /// Business areas carry every action; role administration has no export
    /// surface and the audit log is read/export only.
    #[must_use]
    pub fn catalog() -> &'static [Self] {
        const CATALOG: &[Permission] = &[
            Permission::new(FeatureArea::Clients, ActionType::View),
            Permission::new(FeatureArea::Clients, ActionType::Create),
            Permission::new(FeatureArea::Clients, ActionType::Edit),
            Permission::new(FeatureArea::Clients, ActionType::Delete),
            Permission::new(FeatureArea::Clients, ActionType::Export),
            Permission::new(FeatureArea::Deals, ActionType::View),
            Permission::new(FeatureArea::Deals, ActionType::Create),
            Permission::new(FeatureArea::Deals, ActionType::Edit),
            Permission::new(FeatureArea::Deals, ActionType::Delete),
            Permission::new(FeatureArea::Deals, ActionType::Export),
            Permission::new(FeatureArea::Invoices, ActionType::View),
            Permission::new(FeatureArea::Invoices, ActionType::Create),
            Permission::new(FeatureArea::Invoices, ActionType::Edit),
            Permission::new(FeatureArea::Invoices, ActionType::Delete),
            Permission::new(FeatureArea::Invoices, ActionType::Export),
            Permission::new(FeatureArea::Projects, ActionType::View),
            Permission::new(FeatureArea::Projects, ActionType::Create),
            Permission::new(FeatureArea::Projects, ActionType::Edit),
            Permission::new(FeatureArea::Projects, ActionType::Delete),
            Permission::new(FeatureArea::Projects, ActionType::Export),
            Permission::new(FeatureArea::Roles, ActionType::View),
            Permission::new(FeatureArea::Roles, ActionType::Create),
            Permission::new(FeatureArea::Roles, ActionType::Edit),
            Permission::new(FeatureArea::Roles, ActionType::Delete),
            Permission::new(FeatureArea::Audit, ActionType::View),
            Permission::new(FeatureArea::Audit, ActionType::Export),
        ];

        CATALOG
    }

    /// Returns whether this pair exists in the seeded catalog.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        Self::catalog().contains(self)
    }

    /// Returns a stable storage value, e.g. `clients.view`.
    #[must_use]
    pub fn storage_value(&self) -> String {
        format!("{}.{}", self.feature_area.as_str(), self.action.as_str())
    }

    /// Parses a transport value into a permission.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}.{}",
            self.feature_area.as_str(),
            self.action.as_str()
        )
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (area, action) = value.split_once('.').ok_or_else(|| {
            AppError::Validation(format!(
                "permission '{value}' must look like 'area.action'"
            ))
        })?;

        Ok(Self {
            feature_area: FeatureArea::from_str(area)?,
            action: ActionType::from_str(action)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{ActionType, FeatureArea, Permission};

    #[test]
    fn permission_roundtrip_storage_value() {
        for permission in Permission::catalog() {
            let restored = Permission::from_str(permission.storage_value().as_str());
            assert_eq!(restored.ok(), Some(*permission));
        }
    }

    #[test]
    fn catalog_has_no_duplicate_pairs() {
        let unique: HashSet<_> = Permission::catalog().iter().collect();
        assert_eq!(unique.len(), Permission::catalog().len());
    }

    #[test]
    fn role_export_is_not_seeded() {
        let pair = Permission::new(FeatureArea::Roles, ActionType::Export);
        assert!(!pair.is_seeded());
    }

    #[test]
    fn unknown_permission_is_rejected() {
        assert!(Permission::from_str("clients.unknown").is_err());
        assert!(Permission::from_str("widgets.view").is_err());
        assert!(Permission::from_str("clients").is_err());
    }

    proptest! {
        #[test]
        fn parsing_never_panics(value in ".*") {
            let _ = Permission::from_str(value.as_str());
        }

        #[test]
        fn parsed_values_roundtrip(value in "[a-z]{1,12}\\.[a-z]{1,12}") {
            if let Ok(parsed) = Permission::from_str(value.as_str()) {
                prop_assert_eq!(parsed.storage_value(), value);
            }
        }
    }
}
