//! crates/skill_tutor_core/src/domain.rs
//!
//! Defines the core data structures for the application: generated learning
//! modules, long-running generation jobs, media payloads and chat messages.
//! The serde attributes match the JSON the generation API returns, which is
//! also the format cached in session storage.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

/// The number of sub-pages the module generation prompt asks for.
pub const EXPECTED_SUB_PAGES: usize = 10;

//=========================================================================================
// Learning Modules
//=========================================================================================

/// A generated, paginated lesson for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningModule {
    pub skill_name: String,
    pub sub_pages: Vec<SubPage>,
}

impl LearningModule {
    pub fn is_empty(&self) -> bool {
        self.sub_pages.is_empty()
    }
}

/// One page of a learning module. Blocks are kept in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPage {
    pub title: String,
    pub image_suggestion: String,
    pub motion_storyboard: String,
    #[serde(deserialize_with = "lenient_blocks")]
    pub content: Vec<ContentBlock>,
}

/// Decodes blocks one at a time. A block that does not match its tag's shape
/// becomes `ContentBlock::Unknown` instead of failing the whole page.
fn lenient_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or(ContentBlock::Unknown))
        .collect())
}

impl SubPage {
    /// The blocks a renderer should draw, skipping unrecognised ones.
    pub fn renderable_blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content.iter().filter(|block| block.is_renderable())
    }
}

/// The AI tools a challenge block can point the learner to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolId {
    ImageAnalyzer,
    VideoAnalyzer,
    ImageAnimator,
    ImageGenerator,
    #[serde(other)]
    Unknown,
}

/// A single self-contained unit of a lesson page, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContentBlock {
    Heading { text: String },
    Paragraph { text: String },
    Tip { text: String },
    Template { text: String },
    Benefits { text: String },
    Infographic { text: String },
    FunFact { text: String },
    Quiz {
        question: String,
        options: Vec<String>,
        correct_answer_index: usize,
        explanation: String,
    },
    AiChallenge { challenge: String, tool_id: ToolId },
    Poll { question: String, options: Vec<String> },
    QAndA { question: String, answer: String },
    ExpertSays { quote: String, expert_name: String },
    MythBuster { myth: String, reality: String },
    DoAndDont { dos: Vec<String>, donts: Vec<String> },
    ShockingFact { fact: String },
    IdeaCorner { prompt: String },
    /// Any tag this build does not know about. Rendered as nothing.
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    pub fn is_renderable(&self) -> bool {
        !matches!(self, ContentBlock::Unknown)
    }

    /// For quiz blocks, whether `index` is the correct option. `None` for other kinds.
    pub fn is_correct(&self, index: usize) -> Option<bool> {
        match self {
            ContentBlock::Quiz {
                correct_answer_index,
                ..
            } => Some(*correct_answer_index == index),
            _ => None,
        }
    }
}

//=========================================================================================
// Media and Long-Running Jobs
//=========================================================================================

/// Raw media uploaded by the user, with its MIME type.
#[derive(Debug, Clone)]
pub struct MediaInput {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// The parameters for animating a still image into a short video.
#[derive(Debug, Clone)]
pub struct AnimationRequest {
    pub prompt: String,
    pub image: MediaInput,
    pub aspect_ratio: AspectRatio,
}

/// The provider's handle for one asynchronous generation operation.
///
/// Terminal once `done` is true. A failed operation is reported by the
/// adapter as an error, so a done job without `result_uri` means the
/// provider finished without producing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    pub name: String,
    pub done: bool,
    pub progress_percentage: f64,
    pub result_uri: Option<String>,
}

/// A finished video, downloaded into memory.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub source_uri: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

pub const DEFAULT_ALT_TEXT: &str = "Generated image";

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Bytes,
    pub alt_text: String,
}

//=========================================================================================
// Chat and Streaming
//=========================================================================================

/// A grounding source attached to a generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// One message in a conversation. A bot message grows while its stream is open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamingMessage {
    pub sender: Sender,
    pub text: String,
    pub sources: Vec<Citation>,
}

impl StreamingMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// One fragment received from a provider's token stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub citations: Vec<Citation>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            citations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_decode_by_tag() {
        let json = r#"[
            {"type": "heading", "text": "Colors"},
            {"type": "quiz", "question": "RGB?", "options": ["a", "b"], "correctAnswerIndex": 1, "explanation": "b"},
            {"type": "aiChallenge", "challenge": "Animate it", "toolId": "image-animator"},
            {"type": "qAndA", "question": "Q", "answer": "A"},
            {"type": "doAndDont", "dos": ["x"], "donts": ["y"]},
            {"type": "expertSays", "quote": "Less is more", "expertName": "Dieter"}
        ]"#;
        let blocks: Vec<ContentBlock> = serde_json::from_str(json).unwrap();

        assert_eq!(blocks[0], ContentBlock::Heading { text: "Colors".into() });
        assert_eq!(blocks[1].is_correct(1), Some(true));
        assert_eq!(blocks[1].is_correct(0), Some(false));
        assert_eq!(
            blocks[2],
            ContentBlock::AiChallenge {
                challenge: "Animate it".into(),
                tool_id: ToolId::ImageAnimator,
            }
        );
        assert!(matches!(blocks[3], ContentBlock::QAndA { .. }));
        assert!(matches!(&blocks[5], ContentBlock::ExpertSays { expert_name, .. } if expert_name == "Dieter"));
    }

    #[test]
    fn unknown_tags_are_ignored_not_fatal() {
        let json = r#"{
            "title": "Intro",
            "imageSuggestion": "A pen",
            "motionStoryboard": "Pen writes",
            "content": [
                {"type": "hologram", "beam": 3},
                {"type": "tip", "text": "Practice daily"}
            ]
        }"#;
        let page: SubPage = serde_json::from_str(json).unwrap();

        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[0], ContentBlock::Unknown);
        let visible: Vec<_> = page.renderable_blocks().collect();
        assert_eq!(visible, vec![&ContentBlock::Tip { text: "Practice daily".into() }]);
    }

    #[test]
    fn malformed_blocks_do_not_reject_the_page() {
        let json = r#"{
            "title": "Quiz time",
            "imageSuggestion": "A checklist",
            "motionStoryboard": "Ticks appear",
            "content": [
                {"type": "paragraph", "text": "Pehle basics."},
                {"type": "quiz", "question": "Q?", "options": ["a", "b"], "correctAnswerIndex": 0},
                {"type": "quiz", "question": "Q?", "options": ["a"], "correctAnswerIndex": -1, "explanation": "e"},
                "not even an object",
                {"type": "tip", "text": "Roz practice karo"}
            ]
        }"#;
        let page: SubPage = serde_json::from_str(json).unwrap();

        assert_eq!(page.content.len(), 5);
        assert_eq!(page.content[1], ContentBlock::Unknown);
        assert_eq!(page.content[2], ContentBlock::Unknown);
        assert_eq!(page.content[3], ContentBlock::Unknown);
        let visible: Vec<_> = page.renderable_blocks().collect();
        assert_eq!(
            visible,
            vec![
                &ContentBlock::Paragraph { text: "Pehle basics.".into() },
                &ContentBlock::Tip { text: "Roz practice karo".into() },
            ]
        );
    }

    #[test]
    fn unknown_tool_ids_do_not_reject_the_block() {
        let block: ContentBlock =
            serde_json::from_str(r#"{"type": "aiChallenge", "challenge": "c", "toolId": "telepathy"}"#)
                .unwrap();
        assert!(matches!(block, ContentBlock::AiChallenge { tool_id: ToolId::Unknown, .. }));
    }

    #[test]
    fn module_serializes_with_camel_case_keys() {
        let module = LearningModule {
            skill_name: "Programming".into(),
            sub_pages: vec![SubPage {
                title: "Hello".into(),
                image_suggestion: "Laptop".into(),
                motion_storyboard: "Cursor blinks".into(),
                content: vec![ContentBlock::FunFact { text: "Rust is 2015".into() }],
            }],
        };
        let value = serde_json::to_value(&module).unwrap();

        assert_eq!(value["skillName"], "Programming");
        assert_eq!(value["subPages"][0]["imageSuggestion"], "Laptop");
        assert_eq!(value["subPages"][0]["content"][0]["type"], "funFact");
    }

    #[test]
    fn aspect_ratio_uses_provider_strings() {
        let ratio: AspectRatio = serde_json::from_str(r#""9:16""#).unwrap();
        assert_eq!(ratio, AspectRatio::Portrait);
        assert_eq!(AspectRatio::Landscape.as_str(), "16:9");
    }
}
