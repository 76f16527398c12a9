/// Answer returned whenever the resume does not contain what was asked.
pub const NOT_FOUND_ANSWER: &str = "I could not find the answer in the provided document.";

/// Separator placed between retrieved chunks in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const RESUME_ANALYST_SYSTEM: &str = "You are a resume analysis expert.
You will be given a context from the resume and a user question.
Answer ONLY based on this context.
If no answer, say: \"{not_found}\".

Context: {context}";

/// Builds the system instruction for a question, embedding the retrieved context.
pub fn resume_analyst_system(context: &str) -> String {
    RESUME_ANALYST_SYSTEM
        .replace("{not_found}", NOT_FOUND_ANSWER)
        .replace("{context}", context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_instruction_ends_with_context() {
        let system = resume_analyst_system("Jane Doe\nStaff Engineer at Acme");
        assert!(system.starts_with("You are a resume analysis expert."));
        assert!(system.contains(NOT_FOUND_ANSWER));
        assert!(system.ends_with("Context: Jane Doe\nStaff Engineer at Acme"));
    }
}
