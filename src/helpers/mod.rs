pub mod parser;
pub mod portal;
pub mod titles;
pub mod xlsx;
