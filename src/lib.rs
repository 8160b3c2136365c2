pub mod assemble;
pub mod core;
pub mod export;
pub mod layout;
pub mod ocr;
pub mod pipeline;
pub mod raster;

pub use assemble::{Assembler, Assembly};
pub use pipeline::{PipelineConfig, RunSummary};
