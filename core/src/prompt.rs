//! Prompt construction for the external generation service.
//!
//! The completion call lives outside this crate. Here we only pick the template
//! that matches the assembled context's tag and render the prompt text.

use crate::classify::ContextTag;
use crate::corpus::AssembledContext;
use serde::Serialize;

/// Normal-analysis prompts carry at most this many context characters.
pub const NORMAL_CONTEXT_CHARS: usize = 3500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    /// Context is bibliographic metadata only; the answer must say so.
    CitationCaveat,
    /// Context came from a damaged extraction; the answer must flag the gaps.
    DegradedCaveat,
    NormalAnalysis,
    /// No stored context matched the question.
    General,
}

impl From<ContextTag> for PromptTemplate {
    fn from(tag: ContextTag) -> Self {
        match tag {
            ContextTag::CitationMetadata => PromptTemplate::CitationCaveat,
            ContextTag::DegradedExtraction => PromptTemplate::DegradedCaveat,
            ContextTag::Normal => PromptTemplate::NormalAnalysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub template: PromptTemplate,
    pub text: String,
}

/// Sampling options a caller may forward to its completion service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.3, top_p: 0.8, num_predict: 2000, repeat_penalty: 1.1 }
    }
}

fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn build_prompt(question: &str, context: Option<&AssembledContext>) -> Prompt {
    let context = context.filter(|c| !c.text.trim().is_empty());
    let Some(ctx) = context else {
        return Prompt {
            template: PromptTemplate::General,
            text: format!(
                "You are an expert AI research assistant. Please provide a comprehensive and accurate answer to the following question:\n\n\
                 Question: {question}\n\n\
                 Please provide a detailed, well-structured response that would be helpful for someone analyzing research papers."
            ),
        };
    };
    let template = PromptTemplate::from(ctx.tag);
    let text = match template {
        PromptTemplate::CitationCaveat => format!(
            "The user asked: \"{question}\"\n\n\
             Available context (this is citation metadata, not full paper content):\n{}\n\n\
             Please provide a helpful but accurate response. Clearly indicate that this is bibliographic metadata and not the full paper content. \
             Do not speculate about the paper's actual content beyond what's provided in the metadata.",
            ctx.text
        ),
        PromptTemplate::DegradedCaveat => format!(
            "The user asked: \"{question}\"\n\n\
             Available context (limited due to extraction issues):\n{}\n\n\
             Please provide a helpful response but be clear about the limitations of the available content.",
            ctx.text
        ),
        PromptTemplate::NormalAnalysis | PromptTemplate::General => format!(
            "You are an expert research paper analyzer. Please answer the user's question based on the provided research paper content.\n\n\
             Research Paper Content:\n{}\n\n\
             User's Question: {question}\n\n\
             Please provide a comprehensive, accurate answer based specifically on the research paper content.",
            prefix_chars(&ctx.text, NORMAL_CONTEXT_CHARS)
        ),
    };
    Prompt { template, text }
}
