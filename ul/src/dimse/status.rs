//! DIMSE service status categorization.
//!
//! Every DIMSE response carries a `Status` (0000,0900) code. The code itself
//! is a SOP-class-specific detail, but which *category* it falls into
//! (success, pending, warning, ...) is protocol-level: it determines whether
//! a C-FIND/C-GET/C-MOVE response stream continues or terminates, and
//! whether [`Status::is_success`]-like checks apply uniformly across
//! services. The boundaries below follow the ranges reserved by PS3.7 Annex C.

/// The category a DIMSE status code falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 0x0000: the operation completed successfully.
    Success,
    /// 0xFE00: the operation was cancelled, usually via C-CANCEL-RQ.
    Cancel,
    /// 0xFF00, 0xFF01: more responses are expected for this MessageID.
    Pending,
    /// The operation completed with a warning; a result is still present.
    Warning,
    /// The operation failed outright.
    Failure,
    /// A code outside every known range; treated like a failure by callers
    /// that can't otherwise interpret it.
    Unknown,
}

impl Category {
    /// Whether a response stream for this status should keep waiting for
    /// further responses with the same MessageID.
    pub fn is_pending(self) -> bool {
        matches!(self, Category::Pending)
    }

    /// Whether this category terminates a response stream.
    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

/// Categorize a raw DIMSE status code (the value of tag 0000,0900).
pub fn categorize(status: u16) -> Category {
    match status {
        0x0000 => Category::Success,
        0xFE00 => Category::Cancel,
        0xFF00 | 0xFF01 => Category::Pending,
        0x0001 | 0x0107 | 0x0116 => Category::Warning,
        0xB000..=0xBFFF => Category::Warning,
        0x0105..=0x0124 => Category::Failure,
        0x0210..=0x0213 => Category::Failure,
        0xA000..=0xAFFF => Category::Failure,
        0xC000..=0xCFFF => Category::Failure,
        _ => Category::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x0000, Category::Success)]
    #[case(0xFE00, Category::Cancel)]
    #[case(0xFF00, Category::Pending)]
    #[case(0xFF01, Category::Pending)]
    #[case(0x0001, Category::Warning)]
    #[case(0xB000, Category::Warning)]
    #[case(0xBFFF, Category::Warning)]
    #[case(0x0105, Category::Failure)]
    #[case(0x0124, Category::Failure)]
    #[case(0xA700, Category::Failure)]
    #[case(0xC000, Category::Failure)]
    #[case(0x1234, Category::Unknown)]
    fn test_categorize(#[case] status: u16, #[case] expected: Category) {
        assert_eq!(categorize(status), expected);
    }

    #[test]
    fn pending_keeps_stream_open() {
        assert!(categorize(0xFF00).is_pending());
        assert!(!categorize(0xFF00).is_terminal());
        assert!(categorize(0x0000).is_terminal());
    }
}
