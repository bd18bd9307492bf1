// Cross-cutting prompt fragments shared by every provider call.
// Section-specific templates live in tailoring/prompts.rs.

/// System prompt sent with every call.
pub const SYSTEM: &str = "You are a professional resume writer and career advisor.";

/// Prompt used by connectivity self-tests.
pub const CONNECTION_TEST_PROMPT: &str = "Hello";

/// Prepended to every rewrite prompt.
pub const TRUTHFULNESS_INSTRUCTION: &str = "TRUTHFULNESS: Use only facts already present in \
    the candidate's current text. Do NOT invent employers, titles, dates, metrics, \
    certifications, or skills the candidate did not list. You may reorder, rephrase, \
    and emphasize what is relevant to the job description.";

/// Appended to every rewrite prompt.
pub const PLAIN_TEXT_INSTRUCTION: &str = "Respond with the rewritten text only. \
    Do NOT use markdown. Do NOT add a heading, a preamble, or closing remarks.";
