pub mod error;
pub mod ids;
pub mod mapping;
pub mod schema;
pub mod value;

pub use error::{ModelError, Result, ValueError};
pub use ids::generate_identifier;
pub use mapping::{AlgorithmState, AttributeMapping, EntityMapping, MappingProject, MappingTarget};
pub use schema::{Attribute, AttributeType, EntityType};
pub use value::{Row, Value};
