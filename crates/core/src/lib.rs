pub mod conflict;
pub mod entity;
pub mod error;
pub mod flags;
pub mod hlc;
pub mod ids;
pub mod principal;
pub mod redirect;
pub mod revision;
pub mod summary;
pub mod value;

pub use conflict::{ConflictKind, ConflictSet};
pub use entity::{EntitySnapshot, Reference, SiteLink, Snak, Statement};
pub use error::CoreError;
pub use flags::EditFlags;
pub use hlc::Hlc;
pub use ids::*;
pub use principal::Principal;
pub use redirect::EntityRedirect;
pub use revision::{EntityRevision, RevisionContent};
pub use summary::EditSummary;
pub use value::DataValue;
