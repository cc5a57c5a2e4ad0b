pub mod class;
pub mod field;
pub mod method;
pub mod version;
pub mod annotation;
pub mod descriptor;
