pub mod loader;
pub mod merge;
pub mod resolver;
pub mod resource;
pub mod spec;
pub mod validation;

pub use loader::{load_mappings, load_mappings_from_str};
pub use resolver::Config;
pub use resource::{MappingRecord, MappingScope, ProjectMappingResource, API_VERSION, KIND};
pub use spec::{default_fields, ProjectSpec};
pub use validation::MappingValidator;
