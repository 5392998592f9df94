pub mod picker;
pub mod report;
