// =============================================================================
// =============================================================================

/// Length of a codon in nucleotides
pub const CODON_LENGTH: usize = 3;

// =============================================================================
// =============================================================================

/// Leading coding positions excluded from the threshold pool and stall scan
pub const FIVE_PRIME_MARGIN: usize = 18;

/// Trailing coding positions excluded from the threshold pool and stall scan
pub const THREE_PRIME_MARGIN: usize = 15;

// =============================================================================
// =============================================================================

/// Nucleotides taken upstream of a stall codon's first nucleotide
pub const WINDOW_UPSTREAM: usize = 15;

/// Nucleotides taken from a stall codon's first nucleotide onwards
pub const WINDOW_DOWNSTREAM: usize = 18;

/// Total nucleotide length of a codon window
pub const WINDOW_LENGTH: usize = WINDOW_UPSTREAM + WINDOW_DOWNSTREAM;

/// Codons per window, relative positions -5 to +5
pub const WINDOW_CODONS: usize = WINDOW_LENGTH / CODON_LENGTH;

/// Codons on either side of the stall codon
pub const FLANKING_CODONS: i32 = 5;

// =============================================================================
// =============================================================================

/// Default z-score percentile used as the stall threshold
pub const DEFAULT_PERCENTILE: f64 = 99.0;

/// Default number of highest-density transcripts kept per experiment
pub const DEFAULT_TOP_TRANSCRIPTS: usize = 100;

/// Default transcripts per batch for batched scheduling
pub const DEFAULT_BATCH_SIZE: usize = 64;
