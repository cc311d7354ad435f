pub mod als;
pub mod sentiment;
