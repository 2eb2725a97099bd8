use docbot_core::docs::{truncate_chars, DocResult, QueryCategory, SNIPPET_MAX_CHARS};

pub const NO_RESULTS_ANSWER: &str = "I couldn't find relevant documentation for your question.";
pub const LLM_REQUIRED_MESSAGE: &str = "OpenAI API key required for YAML generation.";

pub fn answer_system_prompt(category: QueryCategory) -> String {
    format!(
        "You answer ngrok questions using ONLY the Documentation Context provided.

CONTEXT: {}

RULES:
- Be concise: 1-3 sentences of explanation
- Only include a YAML example if one appears VERBATIM in the Documentation Context (in a ```yaml block). Never generate, infer, or fabricate YAML
- If the question is conceptual or informational, just answer it - not every answer needs code
- Do NOT show multiple examples for the same thing
- Never invent fields, commands, or configuration options not in the documentation
- Include the source URL at the end
- Use prior thread conversation (if provided) to understand follow-ups
",
        category.context_instruction()
    )
}

pub fn answer_user_prompt(question: &str, doc_context: &str, thread_context: Option<&str>) -> String {
    match thread_context.filter(|context| !context.trim().is_empty()) {
        Some(thread) => format!(
            "Prior conversation in thread:\n{thread}\n\nFollow-up question: {question}\n\nDocumentation Context:\n{doc_context}"
        ),
        None => format!("Question: {question}\n\nDocumentation Context:\n{doc_context}"),
    }
}

pub fn yaml_system_prompt(category: QueryCategory) -> String {
    format!(
        "You generate ngrok YAML configurations by adapting examples from the documentation provided below. Do not use any prior knowledge about ngrok.

CONTEXT: {}

RULES:
- Find YAML examples in the documentation that match the correct context (see above) and adapt them to the user's request
- ONLY use fields and syntax that appear in the documentation examples
- If the docs contain no relevant YAML examples for this topic, say \"The documentation doesn't include a YAML example for this. Check https://ngrok.com/docs\" and summarize what the docs say instead
- Never invent fields - if a field isn't in the doc examples, don't use it",
        category.context_instruction()
    )
}

pub fn yaml_user_prompt(request: &str, doc_context: &str) -> String {
    let mut prompt = format!("Generate an ngrok YAML configuration for: {request}");
    if !doc_context.is_empty() {
        prompt.push_str("\n\nRelevant documentation:\n");
        prompt.push_str(doc_context);
    }
    prompt
}

pub const TICKET_SYSTEM_PROMPT: &str = r#"You synthesize support ticket content from a Slack thread conversation between a user and an ngrok documentation bot.

Given the full thread, create:
1. A concise ticket subject (max 100 chars) that captures the user's core issue
2. A clear description that explains what the user needs help with

Respond in JSON format:
{"subject": "...", "description": "..."}

The description should:
- Summarize what the user was trying to accomplish
- Reference key details from the conversation
- Note what information the bot provided
- Indicate why additional support may be needed"#;

pub fn ticket_user_prompt(thread_context: &str) -> String {
    format!("Slack thread conversation:\n\n{thread_context}")
}

/// Answer used when no model is available: the best hit's excerpt and link.
pub fn fallback_answer(best: &DocResult) -> String {
    let mut answer =
        format!("**{}**\n\n{}", best.title, truncate_chars(&best.content, SNIPPET_MAX_CHARS));
    if !best.link.is_empty() {
        answer.push_str("\n\n🔗 ");
        answer.push_str(&best.link);
    }
    answer
}

/// Drops a leading code fence (with or without a language) and its closer.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let Some((_, body)) = trimmed.split_once('\n') else {
        return trimmed;
    };
    match body.rsplit_once("```") {
        Some((inner, _)) => inner,
        None => body,
    }
}
