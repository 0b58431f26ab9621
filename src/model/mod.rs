pub mod catalog;
pub mod unit;
pub mod work;
