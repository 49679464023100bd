// Shared prompt fragments. Each service that needs LLM calls defines its own
// prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps extraction prompts from inventing content.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Only report text that appears verbatim in the document. \
    Do NOT infer, normalize, translate, or invent details. \
    If the document does not contain something, omit it entirely.";
