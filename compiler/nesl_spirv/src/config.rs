//! Compilation run configuration.

/// SPIR-V 1.3.
pub const DEFAULT_VERSION: u32 = 0x0001_0300;

/// Generator magic recorded in the module header.
pub const DEFAULT_GENERATOR: u32 = 0x1ec5_712d;

#[derive(Clone, Debug)]
pub struct CompilerConfig {
    /// Worker threads materializing entry points (0 = auto-detect).
    pub num_threads: usize,
    /// Version word of the module header.
    pub version: u32,
    /// Generator magic word of the module header.
    pub generator: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            num_threads: 0,
            version: DEFAULT_VERSION,
            generator: DEFAULT_GENERATOR,
        }
    }
}

impl CompilerConfig {
    pub fn single_threaded() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(num_threads: usize) -> Self {
        CompilerConfig {
            num_threads,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn generator(mut self, generator: u32) -> Self {
        self.generator = generator;
        self
    }

    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            rayon::current_num_threads()
        } else {
            self.num_threads
        }
    }
}
