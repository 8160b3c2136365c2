pub mod composite;
pub mod geometry;
pub mod margins;
pub mod model;
pub mod transform;
