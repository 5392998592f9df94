pub mod batch;
pub mod diagnostics;
pub mod run;
