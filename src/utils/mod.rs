pub mod address_validator;
pub mod amount;

pub use address_validator::AddressValidator;
pub use amount::parse_positive_base_units;
