use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use bio::io::fasta;
use log::{info, warn};

use crate::dataset::SequenceProvider;
use crate::io::get_reader;
use crate::types::{RibostallError, TranscriptId};

/// How a FASTA record identifier maps to a transcript identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierStyle {
    /// The record identifier up to the first whitespace.
    #[default]
    RecordId,
    /// One field of a `|`-delimited record identifier, 0-based, e.g. the
    /// transcript alias of GENCODE-style headers.
    PipeField(usize),
}

impl IdentifierStyle {
    /// Transcript identifier for a record, `None` if the field is missing.
    #[must_use]
    pub fn transcript_id<'a>(&self, record_id: &'a str) -> Option<&'a str> {
        match self {
            Self::RecordId => Some(record_id),
            Self::PipeField(index) => record_id.split('|').nth(*index).filter(|f| !f.is_empty()),
        }
    }
}

/// Transcript sequences read from a reference FASTA, upper-cased.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSequences {
    sequences: HashMap<TranscriptId, Vec<u8>>,
}

impl ReferenceSequences {
    /// Reads a plain or gzipped FASTA file.
    ///
    /// # Errors
    ///
    /// I/O errors, or [`RibostallError::ParseError`] for malformed records.
    pub fn read(path: &Path, style: IdentifierStyle) -> Result<Self, RibostallError> {
        let sequences = Self::from_reader(get_reader(path)?, style)?;
        info!(
            "Loaded {} reference sequences from {}",
            sequences.len(),
            path.display()
        );
        Ok(sequences)
    }

    /// # Errors
    ///
    /// Same as [`ReferenceSequences::read`].
    pub fn from_reader<R: BufRead>(
        reader: R,
        style: IdentifierStyle,
    ) -> Result<Self, RibostallError> {
        let mut sequences = HashMap::new();
        for result in fasta::Reader::from_bufread(reader).records() {
            let record = result.map_err(|e| RibostallError::ParseError(e.to_string()))?;
            let Some(id) = style.transcript_id(record.id()) else {
                warn!("Cannot derive a transcript id from record {}", record.id());
                continue;
            };
            sequences.insert(id.to_string(), record.seq().to_ascii_uppercase());
        }
        Ok(Self { sequences })
    }

    pub fn insert(&mut self, transcript: impl Into<TranscriptId>, sequence: impl Into<Vec<u8>>) {
        self.sequences.insert(transcript.into(), sequence.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl SequenceProvider for ReferenceSequences {
    fn sequence(&self, transcript: &str) -> Option<&[u8]> {
        self.sequences.get(transcript).map(Vec::as_slice)
    }
}
