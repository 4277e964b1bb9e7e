pub mod owner;
pub mod trace_id;

pub use owner::{OwnerContext, OWNER_ID_HEADER};
pub use trace_id::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
