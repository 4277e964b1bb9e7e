pub mod db;
pub mod encryption;
pub mod log_redact;
pub mod logging;
pub mod pbkdf2;
pub mod rpc_selector;
pub mod rpc_transport;
pub mod rpc_validator;
