pub mod compile;
pub mod loader;
pub mod schema;
pub mod template;

pub use compile::{CompileError, MalformedRule};
pub use loader::{discover_catalogs, load_from_path, load_from_str, CatalogSource, ConfigError};
pub use schema::{
    AnchorDefinition, Catalog, CompanionDefinition, DocumentDefinition, Metadata, ParamValue,
    PatchDefinition, PlacementKind, TemplateDefinition, ValidationError, ValidationIssue,
};
pub use template::{Template, TemplateError};
