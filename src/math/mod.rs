pub mod bounds;
pub mod ray;
