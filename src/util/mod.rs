pub mod coding;
pub mod comparator;
