pub mod queues;
pub mod zipf;
