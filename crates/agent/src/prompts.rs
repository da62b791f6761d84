//! Prompt construction for the three analysis operations.
//!
//! [`PromptBuilder`] is the seam; callers can bring their own. The bundled
//! [`TemplatePromptBuilder`] renders Tera templates and performs no I/O.

use mailsense_core::{AnalysisError, Category, EmailFacts, ThreadMessage, UserProfile};
use serde::Serialize;
use tera::{Context, Tera};

/// Bodies are cut to this many characters before they reach a prompt.
pub const MAX_BODY_CHARS: usize = 6000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptPair {
    pub system_instruction: String,
    pub user_prompt: String,
}

pub trait PromptBuilder: Send + Sync {
    fn categorization(
        &self,
        email: &EmailFacts,
        categories: &[Category],
    ) -> Result<PromptPair, AnalysisError>;

    fn cold_email(
        &self,
        email: &EmailFacts,
        profile: Option<&UserProfile>,
    ) -> Result<PromptPair, AnalysisError>;

    fn context(
        &self,
        email: &EmailFacts,
        thread: &[ThreadMessage],
    ) -> Result<PromptPair, AnalysisError>;
}

const CATEGORIZE_SYSTEM: &str = "You are an email triage assistant. Assign exactly one category \
from the allowed list. Base the decision on sender, subject and preview only. Reply with data \
matching the provided schema and nothing else.";

const CATEGORIZE_USER: &str = r#"Allowed categories: {{ categories }}

From: {{ from }}
Subject: {{ subject }}
Preview: {{ snippet }}

Return the category, a confidence between 0 and 1, one sentence of reasoning, and optionally a few short mailbox labels that fit this email."#;

const COLD_SYSTEM: &str = "You detect cold email: unsolicited outreach (sales, recruitment, \
partnership) from senders with no prior relationship to the recipient. Newsletters the \
recipient subscribed to, receipts, notifications and replies to existing conversations are \
LEGITIMATE. Reply with data matching the provided schema and nothing else.";

const COLD_USER: &str = r#"{% if profile %}Recipient:
{% if profile.name %}- Name: {{ profile.name }}
{% endif %}{% if profile.email %}- Email: {{ profile.email }}
{% endif %}{% if profile.company %}- Company: {{ profile.company }}
{% endif %}{% if profile.role %}- Role: {{ profile.role }}
{% endif %}{% if interests %}- Interested in: {{ interests }}
{% endif %}
{% endif %}From: {{ from }}
Subject: {{ subject }}

{{ body }}

Decide whether this is a cold email. Use ARCHIVE only when you are confident it is unwanted, LABEL_COLD when it is outreach worth keeping out of the inbox, REVIEW when unsure, and ALLOW for legitimate mail."#;

const CONTEXT_SYSTEM: &str = "You extract working context from email. Summaries are at most 500 \
characters. Only list people, dates and action items that appear in the text. Reply with data \
matching the provided schema and nothing else.";

const CONTEXT_USER: &str = r#"{% if thread %}Earlier messages in this thread, oldest first:
{% for message in thread %}
--- {{ message.from }} | {{ message.subject }}
{{ message.body }}
{% endfor %}
--- end of history

{% endif %}Current message
From: {{ from }}
Subject: {{ subject }}

{{ body }}

Summarize the message, list key points and action items, the people involved with their email addresses and roles when known, any dates with what they refer to, and background context relevant to replying."#;

#[derive(Serialize)]
struct ThreadEntry<'a> {
    from: &'a str,
    subject: &'a str,
    body: String,
}

#[derive(Debug)]
pub struct TemplatePromptBuilder {
    tera: Tera,
}

impl TemplatePromptBuilder {
    pub fn new() -> Result<Self, AnalysisError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("categorize", CATEGORIZE_USER),
            ("cold_email", COLD_USER),
            ("context", CONTEXT_USER),
        ])
        .map_err(|error| AnalysisError::Configuration(format!("invalid prompt template: {error}")))?;
        Ok(Self { tera })
    }

    fn render(&self, template: &str, context: &Context) -> Result<String, AnalysisError> {
        self.tera.render(template, context).map_err(|error| {
            AnalysisError::Configuration(format!("could not render `{template}` prompt: {error}"))
        })
    }
}

fn clip(text: &str) -> String {
    match text.char_indices().nth(MAX_BODY_CHARS) {
        Some((index, _)) => format!("{}\n[truncated]", &text[..index]),
        None => text.to_string(),
    }
}

fn body_or_snippet(email: &EmailFacts) -> String {
    clip(email.body_text().unwrap_or(&email.snippet))
}

impl PromptBuilder for TemplatePromptBuilder {
    fn categorization(
        &self,
        email: &EmailFacts,
        categories: &[Category],
    ) -> Result<PromptPair, AnalysisError> {
        let names: Vec<&str> = categories.iter().map(|category| category.as_str()).collect();
        let mut context = Context::new();
        context.insert("categories", &names.join(", "));
        context.insert("from", &email.from);
        context.insert("subject", &email.subject);
        context.insert("snippet", &email.snippet);

        Ok(PromptPair {
            system_instruction: CATEGORIZE_SYSTEM.to_string(),
            user_prompt: self.render("categorize", &context)?,
        })
    }

    fn cold_email(
        &self,
        email: &EmailFacts,
        profile: Option<&UserProfile>,
    ) -> Result<PromptPair, AnalysisError> {
        let mut context = Context::new();
        context.insert("profile", &profile);
        context.insert("interests", &profile.map(|profile| profile.interests.join(", ")).unwrap_or_default());
        context.insert("from", &email.from);
        context.insert("subject", &email.subject);
        context.insert("body", &body_or_snippet(email));

        Ok(PromptPair {
            system_instruction: COLD_SYSTEM.to_string(),
            user_prompt: self.render("cold_email", &context)?,
        })
    }

    fn context(
        &self,
        email: &EmailFacts,
        thread: &[ThreadMessage],
    ) -> Result<PromptPair, AnalysisError> {
        let history: Vec<ThreadEntry<'_>> = thread
            .iter()
            .map(|message| ThreadEntry {
                from: &message.from,
                subject: &message.subject,
                body: clip(&message.body),
            })
            .collect();

        let mut context = Context::new();
        context.insert("thread", &history);
        context.insert("from", &email.from);
        context.insert("subject", &email.subject);
        context.insert("body", &body_or_snippet(email));

        Ok(PromptPair {
            system_instruction: CONTEXT_SYSTEM.to_string(),
            user_prompt: self.render("context", &context)?,
        })
    }
}
