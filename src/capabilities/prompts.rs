//! Prompt templates for the structured-completion capability.
//!
//! Placeholders are `{snake_case}` tokens substituted with `str::replace`.
//! The rubric template pins the exact JSON shape `RubricEvaluation` parses.

pub const RUBRIC_SYSTEM: &str = "You are an expert interview coach. You respond with a single JSON \
object and nothing else: no prose, no markdown fences, no commentary.";

pub const RUBRIC_PROMPT_TEMPLATE: &str = r#"Analyze this {question_type} interview answer for the role of {role}:

Question: "{question}"
Answer: "{answer}"

Provide a detailed analysis in JSON format with the following structure:
{
    "clarity": {
        "score": 1-10,
        "strengths": [],
        "improvements": []
    },
    "structure": {
        "score": 1-10,
        "has_introduction": boolean,
        "has_main_points": boolean,
        "has_conclusion": boolean,
        "improvements": []
    },
    "content": {
        "score": 1-10,
        "relevance": 1-10,
        "depth": 1-10,
        "key_points": [],
        "missing_elements": []
    },
    "delivery": {
        "conciseness": 1-10,
        "articulation_score": 1-10,
        "improvements": []
    },
    "overall": {
        "score": 1-10,
        "summary": "string",
        "top_strengths": [],
        "priority_improvements": []
    }
}"#;

pub const TECHNICAL_ACCURACY_SYSTEM: &str = "You are a senior engineer assessing factual accuracy of \
technical interview answers. You respond with a single JSON object and nothing else.";

pub const TECHNICAL_ACCURACY_PROMPT_TEMPLATE: &str = r#"Evaluate the technical accuracy of this answer in the context of {role}:
"{answer}"

Respond in JSON:
{
    "accuracy_score": 0-100,
    "concepts_mentioned": [],
    "inaccuracies": [],
    "depth_assessment": "string"
}"#;

/// Fills a template's `{placeholder}` tokens.
pub fn fill(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in substitutions {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_named_placeholders() {
        let out = fill("role={role}, answer={answer}", &[("role", "SRE"), ("answer", "yes")]);
        assert_eq!(out, "role=SRE, answer=yes");
    }

    #[test]
    fn test_fill_leaves_json_braces_alone() {
        let out = fill(RUBRIC_PROMPT_TEMPLATE, &[
            ("question_type", "technical"),
            ("role", "backend engineer"),
            ("question", "What is a mutex?"),
            ("answer", "A lock."),
        ]);
        assert!(out.contains("backend engineer"));
        assert!(out.contains("\"clarity\""));
        assert!(!out.contains("{role}"));
    }
}
