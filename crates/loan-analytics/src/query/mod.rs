//! Query catalog, definitions and parameter binding

mod binder;
pub mod builtin;
mod catalog;
mod definition;
pub mod placeholder;
mod value;

pub use binder::{RawParams, ResolvedParameters, bind};
pub use catalog::QueryCatalog;
pub use definition::{ColumnSpec, ParamInfo, QueryDefinition, QueryDomain, QueryInfo};
pub use value::{ParamKind, ParamSpec, ParamValue};
