use crate::error::{EngineError, Result};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Retrieved chunks are joined with this rule, best-first, so the
/// generator sees relevance ordering in the context block itself.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const DEFAULT_TEMPLATE: &str = "\
Answer the question based only on the following context:

{context}

---

Answer the question based on the above context: {question}
";

pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "\
You are a helpful AI assistant. You will be given data extracted from \
invoice images, including seller name, buyer name, and the items of each \
invoice. Parameters such as product name, quantity, and units appear in \
the order they were printed on the invoice. Answer questions by carefully \
examining the order in which the parameters are mentioned in the data.";

/// A prompt template with `{context}` and `{question}` placeholders,
/// validated at construction.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(EngineError::Config(format!(
                    "prompt template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { template })
    }

    /// Joins `context_chunks` in the order given (best-first) and
    /// substitutes them and the question into the template.
    pub fn render(&self, context_chunks: &[&str], question: &str) -> String {
        let context = context_chunks.join(CONTEXT_SEPARATOR);
        self.template
            .replace(CONTEXT_PLACEHOLDER, &context)
            .replace(QUESTION_PLACEHOLDER, question)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}
