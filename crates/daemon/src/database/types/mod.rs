mod djson;
mod dpin_status;
mod dtimestamp;
mod duuid;

pub use djson::DJson;
pub use dpin_status::DPinStatus;
pub use dtimestamp::DTimestamp;
pub use duuid::DUuid;
