pub mod consumers;
pub mod producer;
