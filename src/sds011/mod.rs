pub mod frame;
pub mod sampler;
pub mod serial;
