//! The result envelope produced by rendering any section.

use serde::{Deserialize, Serialize};

/// Output payload plus its measured token length.
///
/// `length` is always a token count, whether `output` is text or a message
/// array. `too_long` is a soft signal: the section used more tokens than it
/// was allotted. Callers decide whether that is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSection<T> {
    pub output: T,
    pub length: usize,
    pub too_long: bool,
}

impl<T> RenderedSection<T> {
    /// Wrap measured output, flagging it when it exceeds `max_tokens`.
    pub fn measured(output: T, length: usize, max_tokens: usize) -> Self {
        Self {
            output,
            length,
            too_long: length > max_tokens,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RenderedSection<U> {
        RenderedSection {
            output: f(self.output),
            length: self.length,
            too_long: self.too_long,
        }
    }
}

impl<T: Default> RenderedSection<T> {
    /// The rendering of a section that contributed nothing.
    pub fn empty() -> Self {
        Self {
            output: T::default(),
            length: 0,
            too_long: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measured_flags_overflow() {
        assert!(!RenderedSection::measured("a", 10, 10).too_long);
        assert!(RenderedSection::measured("a", 11, 10).too_long);
    }

    #[test]
    fn empty_has_no_length() {
        let empty: RenderedSection<String> = RenderedSection::empty();
        assert_eq!(empty.output, "");
        assert_eq!(empty.length, 0);
        assert!(!empty.too_long);
    }
}
