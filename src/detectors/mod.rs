pub mod discovery;
pub mod module_format;
pub mod scanner;
