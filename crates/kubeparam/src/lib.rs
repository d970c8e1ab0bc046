pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod source;
pub mod template;
pub mod transform;

pub use config::{load_mappings, load_mappings_from_str, Config, MappingRecord, MappingScope, ProjectSpec};
pub use error::{ConfigError, KubeparamError, Result, TemplateError, TransformError};
pub use render::{render_templates, ProjectContext, RenderedTemplate};
pub use source::{SourceError, TemplateSource};
pub use template::{ContextDrop, Rendered, Scope, Template, TemplateHashDrop, TemplatesDrop};
