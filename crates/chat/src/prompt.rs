//! Prompt assembly for retrieval-augmented chat.
//!
//! A template carries two slots, `{context}` and `{input}`. Retrieved
//! document texts are joined with newlines, trimmed to the context budget,
//! and substituted together with the user's question.

use chatrelay_core::error::Error;
use chatrelay_core::token::{estimate_tokens, floor_char_boundary};
use chatrelay_core::vector_store::Document;
use tracing::debug;

const CONTEXT_SLOT: &str = "{context}";
const INPUT_SLOT: &str = "{input}";

/// The built-in retrieval template (Chinese instructions with English
/// translation). It ends with `{input}` so the question closes the prompt.
pub const RAG_TEMPLATE: &str = "上下文信息 / Context:
{context}

请根据以上内容，简要专业地回答用户的问题。如果无法从中获取答案，请回复“抱歉，我无法回答这个问题”，不要编造信息。
Answer the user's question briefly and professionally using only the context above. If the answer is not there, reply \"Sorry, I can't answer this question\" and do not make anything up.

用户问题 / Question:
{input}";

/// Substitute `{context}` and `{input}` in `template`.
///
/// Substitution is a single left-to-right pass, so placeholder-like text
/// inside `context` or `question` is inserted literally and never expanded.
pub fn assemble(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    loop {
        let next = [(CONTEXT_SLOT, context), (INPUT_SLOT, question)]
            .into_iter()
            .filter_map(|(slot, value)| rest.find(slot).map(|pos| (pos, slot, value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, slot, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + slot.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Document texts joined with `"\n"`, in rank order.
pub fn join_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join documents into a context string of at most `max_tokens` tokens.
///
/// Documents are taken in rank order. The first one that does not fit is
/// dropped together with everything ranked below it. A top-ranked document
/// that is too large on its own is cut at a character boundary. A budget
/// of zero means unlimited.
pub fn fit_context(documents: &[Document], max_tokens: usize) -> String {
    if max_tokens == 0 {
        return join_documents(documents);
    }

    let mut context = String::new();
    for (rank, doc) in documents.iter().enumerate() {
        let separator = if rank == 0 { 0 } else { 1 };
        let candidate_len = context.len() + separator + doc.text.len();

        if estimate_tokens_for_len(candidate_len) <= max_tokens {
            if rank > 0 {
                context.push('\n');
            }
            context.push_str(&doc.text);
            continue;
        }

        if rank == 0 {
            let cut = floor_char_boundary(&doc.text, max_tokens.saturating_mul(4));
            context.push_str(&doc.text[..cut]);
            debug!(
                original_tokens = estimate_tokens(&doc.text),
                max_tokens, "Top document truncated to fit context budget"
            );
            if documents.len() > 1 {
                debug!(dropped = documents.len() - 1, "Lower-ranked documents dropped");
            }
        } else {
            debug!(
                kept = rank,
                dropped = documents.len() - rank,
                max_tokens,
                "Context budget reached, dropping lower-ranked documents"
            );
        }
        break;
    }
    context
}

fn estimate_tokens_for_len(len: usize) -> usize {
    len.div_ceil(4)
}

/// A template checked to contain both slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, Error> {
        let text = text.into();
        for slot in [CONTEXT_SLOT, INPUT_SLOT] {
            if !text.contains(slot) {
                return Err(Error::Config {
                    message: format!("prompt template is missing the {slot} placeholder"),
                });
            }
        }
        Ok(Self { text })
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        assemble(&self.text, context, question)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: RAG_TEMPLATE.to_string(),
        }
    }
}
