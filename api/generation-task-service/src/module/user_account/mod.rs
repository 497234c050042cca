pub mod crud;
pub mod model;
