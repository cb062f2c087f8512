//! CrudService: generic CRUD and function calls using the safe SQL builder.

mod crud;
pub mod query;
pub use crud::{function_args, CrudService};
pub use query::{parse_key, ListQuery};
