//! Re-segments streamed model output into whole words.

/// Buffers streamed text and releases one word at a time, each with its
/// trailing whitespace. Concatenating every emitted chunk plus
/// [`WordChunker::finish`] reproduces the input exactly.
#[derive(Debug, Default)]
pub struct WordChunker {
    pending: String,
}

impl WordChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every word it completed.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.pending.push_str(fragment);
        let mut words = Vec::new();

        loop {
            let leading = self.pending.len() - self.pending.trim_start().len();
            let Some(word_len) = self.pending[leading..].find(char::is_whitespace) else {
                break;
            };
            let word_end = leading + word_len;
            let tail = &self.pending[word_end..];
            let end = word_end + (tail.len() - tail.trim_start().len());
            words.push(self.pending.drain(..end).collect());
        }

        words
    }

    /// Flush whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_all(fragments: &[&str]) -> Vec<String> {
        let mut chunker = WordChunker::new();
        let mut out: Vec<String> = fragments.iter().flat_map(|f| chunker.push(f)).collect();
        out.extend(chunker.finish());
        out
    }

    #[test]
    fn test_splits_multi_word_fragment() {
        assert_eq!(
            chunk_all(&["The motion carried [1]."]),
            vec!["The ", "motion ", "carried ", "[1]."]
        );
    }

    #[test]
    fn test_joins_words_split_across_fragments() {
        assert_eq!(
            chunk_all(&["Coun", "cil ap", "proved", " it"]),
            vec!["Council ", "approved ", "it"]
        );
    }

    #[test]
    fn test_citation_split_across_fragments_stays_whole() {
        assert_eq!(chunk_all(&["see [", "1", "] now"]), vec!["see ", "[1] ", "now"]);
    }

    #[test]
    fn test_lossless_with_odd_whitespace() {
        let fragments = ["  Lead", "ing\n\n", "para", "graph\tend  "];
        assert_eq!(chunk_all(&fragments).concat(), fragments.concat());
    }

    #[test]
    fn test_nothing_pending() {
        let mut chunker = WordChunker::new();
        assert!(chunker.push("").is_empty());
        assert!(chunker.finish().is_none());
    }
}
