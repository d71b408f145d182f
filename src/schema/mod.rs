//! Attribute partition: which fields are translatable, global or ordinary.
//!
//! - `partition`: the registered [`EntityType`] and [`FieldClass`]
//! - `registry`: [`EntityDecl`] declarations and the inheritance-aware [`TypeRegistry`]
//! - `validator`: declaration checks run at registration

mod partition;
mod registry;
mod validator;

pub use partition::{
    EntityType, FieldClass, BASE_GLOBAL_FIELDS, CONTENT_GROUP_FIELD, CREATED_AT_FIELD, ID_FIELD,
    LOCALE_FIELD, TYPE_FIELD, UPDATED_AT_FIELD,
};
pub use registry::{EntityDecl, RegistryOptions, TypeRegistry};
pub use validator::{DeclarationValidator, ValidationReport};
