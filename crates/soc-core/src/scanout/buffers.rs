//! Dual line buffers shared between the memory and pixel domains.

/// Identifier of one of the two line buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BufferId {
    /// Line buffer A; the scan source after reset.
    #[default]
    A,
    /// Line buffer B.
    B,
}

impl BufferId {
    /// Returns the other buffer.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Frame sequence number and line index held by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LineTag {
    /// Frame sequence number.
    pub frame_seq: u32,
    /// Line index within the frame.
    pub line: u16,
}

/// Result of committing a filled line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitOutcome {
    /// The target buffer now holds the line.
    Committed,
    /// The target had already become the scan source; its contents were
    /// left untouched.
    Discarded,
}

/// Two line buffers with one locked as the scan source.
///
/// `commit` runs in the memory domain yet consults `scan_source`, which only
/// the pixel-domain reader writes. That check is a modelling guard with no
/// hardware equivalent: real line-buffer RAM would accept the write, and the
/// guard stands in for the reader having already latched the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBufferPair {
    words: [Vec<u16>; 2],
    tags: [Option<LineTag>; 2],
    scan_source: BufferId,
}

impl LineBufferPair {
    /// Allocates two zeroed buffers of `line_words` words; `A` is the scan
    /// source.
    #[must_use]
    pub fn new(line_words: u16) -> Self {
        let len = usize::from(line_words);
        Self {
            words: [vec![0; len], vec![0; len]],
            tags: [None; 2],
            scan_source: BufferId::A,
        }
    }

    /// Buffer currently read by the scanout reader.
    #[must_use]
    pub const fn scan_source(&self) -> BufferId {
        self.scan_source
    }

    /// Makes `buffer` the scan source; the other becomes the fill target.
    pub const fn set_scan_source(&mut self, buffer: BufferId) {
        self.scan_source = buffer;
    }

    /// Contents of a buffer.
    #[must_use]
    pub fn words(&self, buffer: BufferId) -> &[u16] {
        &self.words[buffer.index()]
    }

    /// Line held by a buffer, if any has been committed.
    #[must_use]
    pub const fn tag(&self, buffer: BufferId) -> Option<LineTag> {
        self.tags[buffer.index()]
    }

    /// Pixel `x` of the scan source.
    #[must_use]
    pub fn scan_pixel(&self, x: u16) -> u16 {
        self.words[self.scan_source.index()]
            .get(usize::from(x))
            .copied()
            .unwrap_or(0)
    }

    /// Replaces a whole buffer with a staged line, unless that buffer is the
    /// scan source.
    pub fn commit(&mut self, buffer: BufferId, tag: LineTag, line: &[u16]) -> CommitOutcome {
        if buffer == self.scan_source {
            return CommitOutcome::Discarded;
        }
        let target = &mut self.words[buffer.index()];
        let len = target.len().min(line.len());
        target[..len].copy_from_slice(&line[..len]);
        self.tags[buffer.index()] = Some(tag);
        CommitOutcome::Committed
    }
}
