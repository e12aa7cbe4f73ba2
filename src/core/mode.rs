/// Build mode flags threaded through every pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildMode {
    /// Long-running dev session: page errors never end the process and
    /// successful rebuilds are announced to the notifier.
    pub development: bool,
    /// Minify client script chunks.
    pub minify: bool,
}

impl BuildMode {
    /// One-shot optimized build.
    pub const PRODUCTION: Self = Self {
        development: false,
        minify: true,
    };

    /// Watch session with readable output.
    pub const DEVELOPMENT: Self = Self {
        development: true,
        minify: false,
    };

    #[inline]
    pub const fn is_dev(&self) -> bool {
        self.development
    }

    pub const fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }
}
