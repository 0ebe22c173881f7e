//! Names the rules match against
//!
//! Matching is by exact source text: `FluentMigrator.Migration` or `MigrationAttribute` do not
//! count as the marker, and no aliases are resolved.

/// Base type a class must list to be treated as a migration
pub const MIGRATION_BASE_TYPE: &str = "Migration";

/// Attribute carrying the migration's `yyyyMMddHHmm` version
pub const MARKER_ATTRIBUTE: &str = "Migration";

/// Other FluentMigrator names that are recognized but not checked by any rule
pub const MIGRATION_UP_ATTRIBUTE: &str = "MigrationUp";
pub const PROFILE_ATTRIBUTE: &str = "Profile";

/// Every name known to the catalog
pub const ALL: [&str; 3] = [MARKER_ATTRIBUTE, MIGRATION_UP_ATTRIBUTE, PROFILE_ATTRIBUTE];

/// Whether a base type's text names the migration base type
pub fn is_migration_base(text: &str) -> bool {
    text == MIGRATION_BASE_TYPE
}

/// Whether an attribute's name is the version marker
pub fn is_marker(name: &str) -> bool {
    name == MARKER_ATTRIBUTE
}
