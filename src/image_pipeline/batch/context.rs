use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error};

use crate::image_pipeline::batch::config::BatchConfig;
use crate::image_pipeline::common::error::{DebandError, Result};

/// The three worker pools of one batch run.
///
/// Encoding has its own pool so a file can be written as soon as it is
/// corrected; sharing the decode pool would queue every write behind the
/// decodes of all later files.
pub struct PipelineContext {
    pub decode: ThreadPool,
    pub compute: ThreadPool,
    pub encode: ThreadPool,
}

fn build_pool(name: &'static str, threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("deband-{name}-{i}"))
        .panic_handler(move |_| error!(pool = name, "Worker panicked"))
        .build()
        .map_err(|e| DebandError::WorkerPool(format!("{name} pool: {e}")))
}

impl PipelineContext {
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let compute_threads = config.compute_threads();
        debug!(
            decode = config.decode_threads,
            compute = compute_threads,
            encode = config.encode_threads,
            "Starting worker pools"
        );
        Ok(Self {
            decode: build_pool("decode", config.decode_threads)?,
            compute: build_pool("compute", compute_threads)?,
            encode: build_pool("encode", config.encode_threads)?,
        })
    }
}
