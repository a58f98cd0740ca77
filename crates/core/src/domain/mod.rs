pub mod message;
pub mod series;
