/// Finds the earliest stop sequence in generated text
#[derive(Debug, Clone)]
pub struct StopMatcher {
    sequences: Vec<String>,
}

impl StopMatcher {
    /// Empty strings are ignored
    pub fn new(sequences: &[String]) -> Self {
        Self {
            sequences: sequences.iter().filter(|s| !s.is_empty()).cloned().collect(),
        }
    }

    /// Byte offset of the earliest match of any stop sequence.
    ///
    /// When two sequences start at the same offset the one listed first wins,
    /// which does not change the offset.
    pub fn find(&self, text: &str) -> Option<usize> {
        self.sequences
            .iter()
            .filter_map(|seq| text.find(seq.as_str()))
            .min()
    }

    /// Cut `text` at the first stop sequence. Returns true if one was found.
    pub fn truncate(&self, text: &mut String) -> bool {
        match self.find(text) {
            Some(pos) => {
                text.truncate(pos);
                true
            }
            None => false,
        }
    }
}

/// Token budget and stop-sequence bookkeeping for one completion.
///
/// The backend feeds the decoded completion after every sampled token. A
/// token that completes a stop sequence is not counted, so
/// `completion_tokens() < max_tokens` whenever a stop sequence matched.
#[derive(Debug)]
pub struct CompletionTracker {
    matcher: StopMatcher,
    max_tokens: usize,
    accepted: usize,
    text: String,
    stopped: bool,
}

impl CompletionTracker {
    /// Track a completion limited to `max_tokens`
    pub fn new(matcher: StopMatcher, max_tokens: usize) -> Self {
        Self {
            matcher,
            max_tokens,
            accepted: 0,
            text: String::new(),
            stopped: false,
        }
    }

    /// Record the decoded completion after one more token.
    /// Returns true once generation must end.
    pub fn observe(&mut self, mut decoded: String) -> bool {
        if self.is_done() {
            return true;
        }

        if self.matcher.truncate(&mut decoded) {
            self.text = decoded;
            self.stopped = true;
            return true;
        }

        self.accepted += 1;
        self.text = decoded;
        self.is_done()
    }

    /// The model emitted its end-of-sequence token.
    pub fn end_of_sequence(&mut self) {
        self.stopped = true;
    }

    /// Stopped, or the budget is spent
    pub fn is_done(&self) -> bool {
        self.stopped || self.accepted >= self.max_tokens
    }

    /// A stop sequence or EOS ended generation
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Tokens counted toward the budget
    pub fn completion_tokens(&self) -> usize {
        self.accepted
    }

    /// Completion text with any stop sequence cut off
    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(sequences: &[&str], max_tokens: usize) -> CompletionTracker {
        CompletionTracker::new(matcher(sequences), max_tokens)
    }

    /// Feed cumulative decodes of `pieces` until the tracker is done.
    fn feed(tracker: &mut CompletionTracker, pieces: &[&str]) {
        let mut decoded = String::new();
        for piece in pieces {
            decoded.push_str(piece);
            if tracker.observe(decoded.clone()) {
                break;
            }
        }
    }

    #[test]
    fn test_tracker_hits_token_limit() {
        let mut t = tracker(&["<|eot_id|>"], 3);
        feed(&mut t, &["a", "b", "c", "d", "e"]);
        assert_eq!(t.completion_tokens(), 3);
        assert!(!t.stopped());
        assert_eq!(t.into_text(), "abc");
    }

    #[test]
    fn test_tracker_stop_token_not_counted() {
        let mut t = tracker(&["<|eot_id|>"], 10);
        feed(&mut t, &["Hello", " world", "<|eot_id|>", "ignored"]);
        assert_eq!(t.completion_tokens(), 2);
        assert!(t.stopped());
        assert_eq!(t.into_text(), "Hello world");
    }

    #[test]
    fn test_tracker_stop_on_last_budgeted_token() {
        let mut t = tracker(&["<|eot_id|>"], 3);
        feed(&mut t, &["a", "b", "<|eot_id|>"]);
        assert!(t.stopped());
        assert!(t.completion_tokens() < 3);
    }

    #[test]
    fn test_tracker_stop_spanning_tokens() {
        let mut t = tracker(&["\n\n"], 10);
        feed(&mut t, &["line", "\n", "\n", "more"]);
        assert!(t.stopped());
        assert_eq!(t.completion_tokens(), 2);
        assert_eq!(t.into_text(), "line");
    }

    #[test]
    fn test_tracker_end_of_sequence() {
        let mut t = tracker(&["<|eot_id|>"], 10);
        feed(&mut t, &["one"]);
        t.end_of_sequence();
        assert!(t.is_done());
        assert_eq!(t.completion_tokens(), 1);
        assert!(t.observe("one two".to_string()));
        assert_eq!(t.into_text(), "one");
    }

    #[test]
    fn test_tracker_zero_budget() {
        let t = tracker(&["<|eot_id|>"], 0);
        assert!(t.is_done());
        assert_eq!(t.completion_tokens(), 0);
        assert_eq!(t.into_text(), "");
    }

    fn matcher(sequences: &[&str]) -> StopMatcher {
        let owned: Vec<String> = sequences.iter().map(|s| s.to_string()).collect();
        StopMatcher::new(&owned)
    }

    #[test]
    fn test_earliest_match_wins() {
        let m = matcher(&["<|end_of_text|>", "<|eot_id|>"]);
        let text = "Why do programmers prefer dark mode?<|eot_id|>trailing<|end_of_text|>";
        assert_eq!(m.find(text), Some(text.find("<|eot_id|>").unwrap()));
    }

    #[test]
    fn test_no_match() {
        let m = matcher(&["<|eot_id|>"]);
        assert_eq!(m.find("no stop here"), None);

        let mut text = "no stop here".to_string();
        assert!(!m.truncate(&mut text));
        assert_eq!(text, "no stop here");
    }

    #[test]
    fn test_truncate() {
        let m = matcher(&["\n\n"]);
        let mut text = "first paragraph\n\nsecond".to_string();
        assert!(m.truncate(&mut text));
        assert_eq!(text, "first paragraph");
    }

    #[test]
    fn test_empty_sequences_ignored() {
        let m = matcher(&["", "STOP"]);
        assert_eq!(m.find("abc"), None);
        assert_eq!(m.find("abcSTOP"), Some(3));
    }
}
