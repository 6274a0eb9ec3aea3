//! JSON/HTTP bar source speaking the `{rows: [{t,o,h,l,c,v}], error?}` payload.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{RestConfig, RestProvider};
