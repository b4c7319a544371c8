//! Prompt construction for the review and polish flows.
//!
//! Every prompt is a single user turn built from fixed templates and the
//! user's options. The functions here are pure: same input, same string,
//! no I/O. Unit tests inspect the output directly without a provider.

use crate::request::{PolishRequest, ReviewRequest};

/// Polish intensity bucket selected from the 0–100 slider value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolishLevel {
    /// 0–25
    Light,
    /// 26–50
    Moderate,
    /// 51–75
    Heavy,
    /// 76–100
    Rewrite,
}

impl PolishLevel {
    /// Bucket an intensity value. Values above 100 fall into `Rewrite`.
    pub fn from_intensity(intensity: u8) -> Self {
        match intensity {
            0..=25 => PolishLevel::Light,
            26..=50 => PolishLevel::Moderate,
            51..=75 => PolishLevel::Heavy,
            _ => PolishLevel::Rewrite,
        }
    }

    pub fn style_guidance(&self) -> &'static str {
        match self {
            PolishLevel::Light => {
                "Make minor improvements while preserving the original structure and style."
            }
            PolishLevel::Moderate => {
                "Enhance clarity and coherence while maintaining the original tone."
            }
            PolishLevel::Heavy => {
                "Significantly improve the text, focusing on academic style and clarity."
            }
            PolishLevel::Rewrite => {
                "Completely rewrite the text to achieve a high-quality academic standard."
            }
        }
    }
}

const POLISH_CHECKLIST: &str = "Focus on:
1. Using precise and formal academic language
2. Eliminating colloquialisms and informal expressions
3. Ensuring logical flow and coherence between sentences and paragraphs
4. Maintaining an objective and impersonal tone
5. Using appropriate academic terminology and phrases
6. Avoiding repetition and redundancy
7. Ensuring proper citation and referencing style (if applicable)
8. Adhering to standard academic writing conventions";

/// Build the polish instruction. The original text is embedded verbatim.
pub fn polish_prompt(request: &PolishRequest) -> String {
    let guidance = PolishLevel::from_intensity(request.intensity()).style_guidance();
    format!(
        "As an expert academic editor, please polish the following {language} text to improve \
its clarity, coherence, and academic style. {guidance}

{POLISH_CHECKLIST}

Original text:
{text}

Please provide the polished version of the text, ensuring it maintains a genuine academic \
style and avoids any mechanical or AI-like patterns or expressions.",
        language = request.target_language,
        text = request.text,
    )
}

/// The four categorical outcomes the review must end with.
pub const RECOMMENDATIONS: [&str; 4] = ["Accept", "Minor Revision", "Major Revision", "Reject"];

const REVIEW_STRUCTURE: &str = "Please structure your review as follows:

# Overall Evaluation: Briefly assess the paper's overall quality and contribution.
# Major Strengths: List the main strengths and innovative aspects of the paper.
# Major Weaknesses: Point out the main issues and shortcomings of the paper.
# Specific Comments:
   ## Introduction: Evaluate the clarity and relevance of the research background, problem statement, and research objectives.
   ## Methodology: Assess the appropriateness, innovation, and rigor of the research methods.
   ## Results: Evaluate the reliability, validity, and presentation of the results.
   ## Discussion: Assess the author's interpretation of results, comparison with existing literature, and recognition of research limitations.
   ## Conclusion: Evaluate the reasonableness of the conclusion and its contribution to the field.
   ## Detailed Revision Suggestions: Provide specific revision suggestions, including language expression and formatting.";

/// Build the review instruction for a paper.
pub fn review_prompt(request: &ReviewRequest) -> String {
    let o = &request.options;
    let extra = o.extra_requirements.trim();
    let extra = if extra.is_empty() { "None" } else { extra };

    format!(
        "As an experienced academic paper reviewer, please carefully review the following paper \
and provide detailed feedback. Consider the following aspects:

1. Field: {field}
2. Focus: {focus}
3. Paper Type: {paper_type}
4. Detailed Review: {detail}
5. Output Language: {language}
6. Strictness Level: {strictness}/100 (0 = lenient, 100 = very strict)
7. Additional Requirements: {extra}

{REVIEW_STRUCTURE}
# Final Recommendation: Give your final recommendation for this paper ({recommendations}).

Write the entire review in {language}, formatted as Markdown.

Paper content:
\"\"\"
{text}
\"\"\"

Please provide your professional review based on the above information.",
        field = o.field,
        focus = o.focus,
        paper_type = o.paper_type,
        detail = o.detail_level,
        language = o.output_language,
        strictness = o.strictness(),
        recommendations = recommendations_list(),
        text = request.document_text.trim(),
    )
}

fn recommendations_list() -> String {
    let [head @ .., last] = RECOMMENDATIONS;
    format!("{}, or {}", head.join(", "), last)
}
