// Logging setup for the generator binary

use tracing::Level;

/// Verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Errors only
    Quiet,
    /// Errors, warnings and run summaries
    Normal,
    /// Per-file decisions
    Verbose,
    /// Search path and template lookups
    VeryVerbose,
}

impl VerbosityLevel {
    /// Map CLI flags to a verbosity level
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return VerbosityLevel::Quiet;
        }
        match verbose {
            0 => VerbosityLevel::Normal,
            1 => VerbosityLevel::Verbose,
            _ => VerbosityLevel::VeryVerbose,
        }
    }

    /// Maximum tracing level emitted at this verbosity
    pub fn max_level(&self) -> Level {
        match self {
            VerbosityLevel::Quiet => Level::ERROR,
            VerbosityLevel::Normal => Level::INFO,
            VerbosityLevel::Verbose => Level::DEBUG,
            VerbosityLevel::VeryVerbose => Level::TRACE,
        }
    }
}

/// Install the fmt subscriber; diagnostics go to stderr
pub fn init_logging(level: VerbosityLevel) {
    tracing_subscriber::fmt()
        .with_max_level(level.max_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
