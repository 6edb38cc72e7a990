//! Mapping application engine.
//!
//! [`MappingService`] manages mapping projects through a [`RuleStore`] and
//! applies them to target repositories found in a [`SchemaCatalog`].

pub mod apply;
pub mod builder;
pub mod compatibility;
pub mod error;
pub mod evaluator;
pub mod memory;
pub mod progress;
pub mod references;
pub mod service;
pub mod traits;

pub use apply::ApplyRequest;
pub use builder::{SOURCE_ATTRIBUTE, create_target_metadata};
pub use compatibility::check_compatible;
pub use error::{
    CompatibilityError, ErrorCategory, EvaluationError, MappingError, Result, StoreError,
};
pub use evaluator::AttributeReferenceEvaluator;
pub use memory::{
    DEFAULT_BACKEND, DefaultRowConstructor, MemoryCatalog, MemoryRowStore, MemoryRuleStore,
    NoPermissions, RecordingPermissions, WriteCall,
};
pub use progress::{
    MAPPING_BATCH_SIZE, ProgressEvent, RecordingProgress, TracingProgress, batch_units,
    estimate_units,
};
pub use references::self_referencing_attributes;
pub use service::MappingService;
pub use traits::{
    ExpressionEvaluator, PermissionGranter, ProgressSink, RowBatches, RowConstructor, RowStore,
    RuleStore, SchemaCatalog,
};
