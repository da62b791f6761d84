use serde::{Deserialize, Serialize};

/// Read-only view of a message as supplied by the mail source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailFacts {
    pub from: String,
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl EmailFacts {
    /// Bare, lowercased sender address. `"Jane Roe <Jane@Example.com>"` becomes
    /// `"jane@example.com"`; a header without angle brackets is used as is.
    pub fn sender_address(&self) -> String {
        normalize_address(&self.from)
    }

    /// Body text when present and not blank.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().filter(|body| !body.trim().is_empty())
    }

    pub fn has_body(&self) -> bool {
        self.body_text().is_some()
    }
}

pub fn normalize_address(header: &str) -> String {
    let trimmed = header.trim();
    let address = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
        _ => trimmed,
    };
    address.trim().to_ascii_lowercase()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub from: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Optional recipient context that helps tell wanted outreach from cold outreach.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::{normalize_address, EmailFacts};

    fn facts(from: &str, body: Option<&str>) -> EmailFacts {
        EmailFacts {
            from: from.to_string(),
            subject: "subject".to_string(),
            snippet: "snippet".to_string(),
            body: body.map(str::to_string),
        }
    }

    #[test]
    fn sender_address_strips_display_name_and_case() {
        assert_eq!(facts("Jane Roe <Jane@Example.COM>", None).sender_address(), "jane@example.com");
        assert_eq!(facts("  sales@vendor.com ", None).sender_address(), "sales@vendor.com");
        assert_eq!(normalize_address("\"Roe, Jane\" <jane@example.com>"), "jane@example.com");
    }

    #[test]
    fn blank_body_counts_as_absent() {
        assert!(!facts("a@b.c", Some("  \n")).has_body());
        assert!(!facts("a@b.c", None).has_body());
        assert_eq!(facts("a@b.c", Some("hello")).body_text(), Some("hello"));
    }
}
