//! Reusable prompts using Handlebars for templating. Strict mode makes
//! a missing field a render error instead of a silently empty prompt.

use std::fmt;

use handlebars::Handlebars;

#[derive(Debug)]
pub enum Prompt {
    TutorSystem,
    ExplainCommand,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const TUTOR_SYSTEM_PROMPT: &str = r"
You are CodeVault AI, an expert senior software engineer acting as a tutor for a student.

CURRENT PROJECT CONTEXT:
- Title: {{title}}
- Language: {{language}}
- Difficulty: {{difficulty}}
- Description: {{description}}

FILE STRUCTURE:
{{file_structure}}

YOUR ROLE:
1. Answer questions specifically about this project's code structure and logic.
2. If the student asks general coding questions, relate them back to this project.
3. Be encouraging, concise, and use technical but accessible language.
4. Use Markdown for your responses (code blocks, bold text, lists).
5. Keep responses relatively short (under 3 paragraphs) unless asked for a deep dive.

Start by briefly introducing the project and suggesting 2 interesting files they should look at first.
";

const EXPLAIN_COMMAND_PROMPT: &str =
    "Explain this CLI command to a beginner student in one short sentence: `{{command}}`";

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, HTML escaping would mangle quotes in
    // commands and code
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(&Prompt::TutorSystem.to_string(), TUTOR_SYSTEM_PROMPT)
        .expect("Failed to register template");
    registry
        .register_template_string(&Prompt::ExplainCommand.to_string(), EXPLAIN_COMMAND_PROMPT)
        .expect("Failed to register template");
    registry
}
