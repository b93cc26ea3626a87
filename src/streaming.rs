use crate::llm::LlmEvent;

/// Marker appended to the in-progress rendering of a response
pub const CURSOR: &str = "▌";

/// Outcome of feeding one event to the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing visible changed (empty fragment)
    Unchanged,
    /// Redraw with this rendering: accumulated text plus the cursor marker
    Redraw(String),
    /// Stream ended; final rendering and the completed response
    Finished(String),
    /// Stream failed; text accumulated so far is discarded by the caller
    Failed(String),
}

/// Accumulates streamed fragments into a growing response.
///
/// Renders only ever grow: each in-progress render is the previous one plus
/// zero or more characters, and the final render drops the cursor.
#[derive(Debug, Clone, Default)]
pub struct ResponseAccumulator {
    text: String,
    finished: bool,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stream event
    pub fn process_event(&mut self, event: LlmEvent) -> Step {
        if self.finished {
            return Step::Unchanged;
        }

        match event {
            LlmEvent::TextDelta(delta) => {
                if delta.is_empty() {
                    return Step::Unchanged;
                }
                self.text.push_str(&delta);
                Step::Redraw(self.in_progress())
            }
            LlmEvent::StreamComplete => {
                self.finished = true;
                Step::Finished(self.text.clone())
            }
            LlmEvent::Error(error) => {
                self.finished = true;
                Step::Failed(error)
            }
        }
    }

    /// Called when the channel closes without an explicit completion event
    pub fn finish(&mut self) -> Step {
        self.process_event(LlmEvent::StreamComplete)
    }

    pub fn in_progress(&self) -> String {
        format!("{}{}", self.text, CURSOR)
    }
}
