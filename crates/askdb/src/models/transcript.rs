use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptBlockKind {
    Question,
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptBlock {
    pub kind: TranscriptBlockKind,
    pub text: String,
}

/// Append-only conversation history handed whole to every collaborator call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    blocks: Vec<TranscriptBlock>,
    rendered: String,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_question(&mut self, text: &str) {
        self.rendered.push_str(&format!("Question: {text}\n"));
        self.blocks.push(TranscriptBlock {
            kind: TranscriptBlockKind::Question,
            text: text.to_string(),
        });
    }

    pub fn push_response(&mut self, text: &str) {
        self.rendered.push_str(&format!("Response: {text}\n\n"));
        self.blocks.push(TranscriptBlock {
            kind: TranscriptBlockKind::Response,
            text: text.to_string(),
        });
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    #[must_use]
    pub fn blocks(&self) -> &[TranscriptBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn count(&self, kind: TranscriptBlockKind) -> usize {
        self.blocks.iter().filter(|block| block.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::{Transcript, TranscriptBlockKind};

    #[test]
    fn renders_question_and_response_blocks_in_order() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());

        transcript.push_question("who works here");
        transcript.push_response("Ann works here.");
        transcript.push_question("since when");

        assert_eq!(
            transcript.as_str(),
            "Question: who works here\nResponse: Ann works here.\n\nQuestion: since when\n"
        );
        assert_eq!(transcript.count(TranscriptBlockKind::Question), 2);
        assert_eq!(transcript.count(TranscriptBlockKind::Response), 1);
        assert_eq!(transcript.blocks()[1].text, "Ann works here.");
    }
}
