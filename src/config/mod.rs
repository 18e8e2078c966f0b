pub mod loader;
pub mod schema;
pub mod version;

pub use loader::{discover, load_from_path, load_from_str, ConfigError};
pub use schema::{
    Alternative, Catalog, EditStep, Marker, Metadata, PatchUnit, Position, Precondition,
    ValidationError, ValidationIssue, DEFAULT_BACKUP_DIR,
};
pub use version::{detect_version, matches_requirement, VersionError};
