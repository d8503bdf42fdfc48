pub mod analysis;
pub mod data;
pub mod fetch;
pub mod forecast;
pub mod registry;
pub mod station;
pub mod tools;
