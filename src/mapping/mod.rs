//! # Data Mapping
//!
//! Field-level translation between vendor payloads and the canonical task.
//!
//! ## Architecture
//!
//! - **Paths**: dotted-path get/set over nested JSON objects ([`get_path`], [`set_path`])
//! - **Config**: ordered [`FieldMapping`]s, [`FieldTransform`]s and [`FieldValidation`]s
//! - **Transformers**: `map`, `format`, `template`, `custom`, plus any registered by a plugin
//! - **Validators**: `required`, `type`, `range`, `pattern`, plus any registered by a plugin
//! - **Mapper**: [`DataMapper::map_fields`] drives a full pull or push pass
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use zen_core::mapping::{DataMapper, FieldMapping, FieldMappingConfig};
//! use zen_core::models::SyncDirection;
//!
//! let config = FieldMappingConfig::new()
//!     .with_mapping(FieldMapping::new("title", "fields.summary").required())
//!     .with_mapping(FieldMapping::new("status", "fields.status.name"));
//!
//! let issue = json!({"fields": {"summary": "Fix login", "status": {"name": "Open"}}});
//! let outcome = DataMapper::new().map_fields(&issue, &config, SyncDirection::Pull);
//!
//! assert!(outcome.is_ok());
//! assert_eq!(outcome.target, json!({"title": "Fix login", "status": "Open"}));
//! ```

pub mod config;
pub mod mapper;
pub mod path;
pub mod transformers;
pub mod validators;

pub use config::{FieldMapping, FieldMappingConfig, FieldTransform, FieldValidation, ValidationRule};
pub use mapper::{DataMapper, FieldError, MappingOutcome};
pub use path::{get_path, set_path};
pub use transformers::{
    CustomTransformer, FieldTransformer, FormatTransformer, MapTransformer, TemplateTransformer,
};
pub use validators::{
    FieldValidator, PatternValidator, RangeValidator, RequiredValidator, TypeValidator,
};
