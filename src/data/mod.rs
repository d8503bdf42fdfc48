pub mod observation;
pub mod table;

pub use observation::BuoyObservation;
pub use observation::BuoyObservationCollection;
pub use observation::BuoyVariable;
pub use observation::ObservationParseError;
pub use table::BuoyDataTable;
pub use table::ConditionSummary;
pub use table::CurrentConditions;
