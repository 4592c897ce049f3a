//! Prompt templates for every LLM-backed feature.

/// Persona name used in the chat prompts.
pub const ASSISTANT_NAME: &str = "LexiCounsel";

/// Disclaimer the general chat prompt requires the model to open with.
pub const CHAT_DISCLAIMER: &str = "Disclaimer: I am an AI assistant and cannot provide legal advice. \
The following information is for educational purposes only. \
Please consult with a qualified professional for any legal concerns.";

pub fn translation(text: &str, language_name: &str) -> String {
    format!(
        "Translate the following legal document text to {language_name}. \
         Provide only the translated text as the output:\n\n---\n\n{text}"
    )
}

pub fn explanation(text: &str) -> String {
    format!("Explain the following legal text in simple, clear terms for a non-lawyer:\n\n{text}")
}

pub fn mindmap(text: &str) -> String {
    format!(
        "Analyze the legal text and generate a concise mind map as a JSON object. \
         Focus on the 4-6 most critical themes. The JSON must have a 'title' and a 'children' array. \
         Example: {{\"title\": \"Summary\", \"children\": [{{\"title\": \"Theme 1\"}}]}}. \
         Provide only the JSON object. Text:\n\n{text}"
    )
}

/// Chat prompt constrained to the user's uploaded document.
pub fn document_chat(document: &str, question: &str) -> String {
    format!(
        "SYSTEM INSTRUCTION:\n\
         You are '{ASSISTANT_NAME}', a specialized AI legal assistant. Your sole purpose is to analyze \
         and answer questions based *strictly* on the legal document provided by the user.\n\
         RULES:\n\
         1. **Strict Context Adherence:** Base your entire response on the text within the \
         'DOCUMENT CONTEXT' section. Do not use any external knowledge.\n\
         2. **No Assumptions:** If the document does not contain the answer, you must state that clearly.\n\
         3. **Persona:** Maintain a professional, helpful, and neutral tone. Do not give legal advice.\n\
         4. **Refusal:** If the user's question is unrelated to the document (e.g., general knowledge), \
         politely refuse and state that your function is limited to analyzing the provided text.\n\
         DOCUMENT CONTEXT:\n---\n{document}\n---\nUSER'S QUESTION: {question}\n"
    )
}

/// Chat prompt used when no document context exists.
pub fn general_chat(question: &str) -> String {
    format!(
        "SYSTEM INSTRUCTION:\n\
         You are '{ASSISTANT_NAME}', a helpful AI assistant specializing in legal and ethical topics. \
         The user has not provided a specific document.\n\
         RULES:\n\
         1. **Domain:** Answer the user's question based on your general knowledge of legal principles \
         and ethical frameworks, particularly within the context of India.\n\
         2. **Disclaimer:** You MUST begin your response with the following disclaimer: \"{CHAT_DISCLAIMER}\"\n\
         3. **Persona:** Maintain a professional, informative, and neutral tone.\n\
         USER'S QUESTION: {question}\n"
    )
}

pub fn clause_comparison(document: &str) -> String {
    format!(
        "You are a legal document analyst. Compare the provided \"User's Document\" against standard \
         principles for a residential rental agreement in India.\n\
         Analyze and identify three categories, responding in a valid JSON format.\n\
         1. \"missing_clauses\": A list of important, standard clauses that are absent.\n\
         2. \"risky_clauses\": A list of clauses present that seem unfair or risky for a tenant.\n\
         3. \"summary\": A brief, one-paragraph overall assessment of the document.\n\
         Standard Principles: Clearly defined parties, property, term, rent, deposit, a reasonable \
         notice period (1-2 months), maintenance responsibilities.\n\
         User's Document:\n---\n{document}\n---\n\
         Provide a single, valid JSON object with the keys \"missing_clauses\", \"risky_clauses\", and \"summary\".\n"
    )
}

pub fn clause_draft(description: &str) -> String {
    format!(
        "As a legal assistant, draft a standard, clear, and fair legal clause for a rental agreement \
         based on the following user request.\n\
         The clause should be legally sound for a typical residential tenancy in India.\n\
         Provide only the numbered clause text as the output.\n\
         User Request: \"{description}\"\n"
    )
}

pub fn key_dates(document: &str) -> String {
    format!(
        "Analyze the following legal document and extract all key dates.\n\
         For each date found, identify its legal significance (e.g., \"Agreement Start Date\", \
         \"Lease Expiry Date\", \"Notice Date\").\n\
         Provide the result as a single, valid JSON array of objects, where each object has a \
         \"date\" and a \"significance\" key.\n\
         Example: [{{\"date\": \"2024-01-01\", \"significance\": \"Effective Start Date\"}}]\n\n\
         --- DOCUMENT TEXT ---\n{document}\n"
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn translation_prompt_names_language_and_keeps_text() {
        let prompt = translation("The lessee shall vacate.", "German");
        assert!(prompt.contains("to German."));
        assert!(prompt.contains("Provide only the translated text"));
        assert!(prompt.ends_with("The lessee shall vacate."));
    }

    #[test]
    fn general_chat_demands_disclaimer() {
        assert!(general_chat("Is a verbal lease valid?").contains(CHAT_DISCLAIMER));
    }

    #[test]
    fn document_chat_embeds_context() {
        let prompt = document_chat("Rent is due on the 5th.", "When is rent due?");
        assert!(prompt.contains("---\nRent is due on the 5th.\n---"));
        assert!(prompt.contains("USER'S QUESTION: When is rent due?"));
    }
}
