//! services/api/src/adapters/module_llm.rs
//!
//! This module contains the adapter for the learning-module generating LLM.
//! It implements the `ModuleGenerationService` port from the `core` crate,
//! asking for structured JSON constrained by a response schema.

use async_trait::async_trait;
use serde_json::{json, Value};
use skill_tutor_core::{LearningModule, ModuleGenerationService, PortError, PortResult};
use tracing::info;

use super::gemini::{Content, GeminiClient, GenerateContentRequest, Part};

const MODULE_PROMPT_TEMPLATE: &str = r#"
Ek freelance skill "{skill}" ke liye ek extremely engaging learning module generate karo, jo Hinglish (Hindi + English) mein ho.
Ye module Indian students ke liye super fun, visual, aur relatable hona chahiye. Plain text se bacho.
Total 10 detailed sub-pages generate karo.

Har page ko in sabhi interactive elements se bhar do. Har page par kam se kam 5-6 alag-alag block types istemaal karo. Bohot variety chahiye:
- 'heading', 'paragraph', 'tip', 'template', 'benefits', 'infographic', 'funFact'
- 'quiz': Interesting sawal, 4 options, sahi jawab, aur explanation.
- 'aiChallenge': Creative task jo user ko app ke AI tools ('image-analyzer', 'video-analyzer', 'image-animator', 'image-generator') use karne ke liye challenge kare.
- 'poll': Ek interesting question jiske multiple options ho.
- 'qAndA': Common student doubts ko solve karo.
- 'expertSays': Ek virtual expert ka quote.
- 'mythBuster': Skill se jude myths ko bust karo.
- 'doAndDont': Quick tips in a list format.
- 'shockingFact': Ek dum unexpected fact.
- 'ideaCorner': User ko kuch naya sochne ke liye inspire karo.

Content ko friendly, encouraging, aur bohot hi zyada interesting banao. Har page ek naya adventure lagna chahiye.
"#;

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn strings() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

/// An object schema whose `type` property is pinned to `tags`.
fn block(tags: &[&str], fields: &[(&str, Value)]) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert("type".into(), json!({ "type": "STRING", "enum": tags }));
    let mut required = vec![Value::from("type")];
    for (name, schema) in fields {
        properties.insert((*name).into(), schema.clone());
        required.push(Value::from(*name));
    }
    json!({ "type": "OBJECT", "properties": properties, "required": required })
}

/// The response schema for a whole learning module.
pub fn module_schema() -> Value {
    let content_block = json!({
        "anyOf": [
            block(
                &["heading", "paragraph", "tip", "template", "benefits", "infographic", "funFact"],
                &[("text", string())],
            ),
            block(
                &["quiz"],
                &[
                    ("question", string()),
                    ("options", strings()),
                    ("correctAnswerIndex", json!({ "type": "INTEGER" })),
                    ("explanation", string()),
                ],
            ),
            block(
                &["aiChallenge"],
                &[
                    ("challenge", string()),
                    (
                        "toolId",
                        json!({
                            "type": "STRING",
                            "enum": ["image-analyzer", "video-analyzer", "image-animator", "image-generator"]
                        }),
                    ),
                ],
            ),
            block(&["poll"], &[("question", string()), ("options", strings())]),
            block(&["qAndA"], &[("question", string()), ("answer", string())]),
            block(&["expertSays"], &[("quote", string()), ("expertName", string())]),
            block(&["mythBuster"], &[("myth", string()), ("reality", string())]),
            block(&["doAndDont"], &[("dos", strings()), ("donts", strings())]),
            block(&["shockingFact"], &[("fact", string())]),
            block(&["ideaCorner"], &[("prompt", string())]),
        ]
    });

    let sub_page = json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "A catchy title for the sub-page." },
            "imageSuggestion": {
                "type": "STRING",
                "description": "A descriptive suggestion for a relevant image or illustration (e.g., 'A student looking confused at code')."
            },
            "content": {
                "type": "ARRAY",
                "items": content_block,
                "description": "An array of various content blocks that make up the page."
            },
            "motionStoryboard": {
                "type": "STRING",
                "description": "A short, creative idea for a motion graphic or animation to be used on this page."
            }
        },
        "required": ["title", "imageSuggestion", "content", "motionStoryboard"]
    });

    json!({
        "type": "OBJECT",
        "properties": {
            "skillName": { "type": "STRING", "description": "The name of the skill being taught." },
            "subPages": {
                "type": "ARRAY",
                "items": sub_page,
                "description": "An array of 10 sub-pages for the learning module."
            }
        },
        "required": ["skillName", "subPages"]
    })
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ModuleGenerationService` using a Gemini model.
#[derive(Clone)]
pub struct GeminiModuleAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiModuleAdapter {
    /// Creates a new `GeminiModuleAdapter`.
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `ModuleGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModuleGenerationService for GeminiModuleAdapter {
    async fn generate_module(&self, skill_name: &str) -> PortResult<LearningModule> {
        let prompt = MODULE_PROMPT_TEMPLATE.replace("{skill}", skill_name);
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": module_schema(),
            })),
            ..Default::default()
        };

        info!(model = %self.model, skill = skill_name, "Requesting learning module.");
        let response = self.client.generate_content(&self.model, &request).await?;

        let json_text = response
            .text()
            .ok_or_else(|| PortError::Upstream("API returned no text.".to_string()))?;

        serde_json::from_str::<LearningModule>(&json_text)
            .map_err(|e| PortError::Unexpected(format!("Module JSON did not match the schema: {}", e)))
    }
}
