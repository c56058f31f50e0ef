// Prompts for the resume feedback service.

/// System prompt for every analysis call.
pub const RESUME_SYSTEM_PROMPT: &str =
    "You are an expert HR consultant providing detailed resume feedback.";

/// Builds the full feedback request for one resume/role pair.
pub fn build_feedback_prompt(job_role: &str, resume_content: &str) -> String {
    format!(
        "You are an expert HR consultant and career advisor. Analyze the following resume for a {job_role} position.

Resume Content:
{resume_content}

Please provide a comprehensive review including:

1. **Overall Score**: Rate the resume out of 10

2. **Strengths**: List 3-5 strong points of this resume

3. **Areas for Improvement**: List 3-5 things that could be better

4. **Missing Elements**: What's missing that should be added?

5. **ATS Compatibility**: How well would this resume pass Applicant Tracking Systems?

6. **Specific Suggestions**: Provide actionable tips to improve this resume for a {job_role} role

7. **Keywords to Add**: Suggest relevant keywords for this role

Be specific, constructive, and helpful in your feedback."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_role_and_content() {
        let prompt = build_feedback_prompt("Data Engineer", "worked on pipelines");
        assert!(prompt.contains("Data Engineer position"));
        assert!(prompt.contains("worked on pipelines"));
        assert!(prompt.contains("ATS Compatibility"));
    }
}
