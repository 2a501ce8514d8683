// LLM prompt constants for the semantic role hint.

/// System prompt for role hints: enforces JSON-only output.
pub const ROLE_HINT_SYSTEM: &str =
    "You are an expert technical recruiter. \
    Classify a job description into exactly one role category. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Role hint prompt template. Replace `{roles}` and `{jd_text}` before sending.
pub const ROLE_HINT_PROMPT_TEMPLATE: &str = r#"Classify the job description below into ONE of these role categories:
{roles}

Judge the job's dominant discipline. A technology mentioned in passing (for example
"integrate with an LLM API") does not make the job an AI systems role.

Return a JSON object with this EXACT schema (no extra fields):
{"role": "<one category key from the list>", "confidence": 0.0}

confidence is a number between 0.0 and 1.0.

Job description:
{jd_text}"#;
