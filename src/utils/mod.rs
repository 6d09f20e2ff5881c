pub mod data;
pub mod odds;
pub mod value_analysis;
