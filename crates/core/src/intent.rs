use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified purpose of one user turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TicketCreation,
    KnowledgeQuery,
    ExternalAgent,
    GeneralChat,
}

impl Intent {
    /// Keyword tie-break order: earlier wins.
    pub const PRIORITY: [Self; 3] = [Self::TicketCreation, Self::ExternalAgent, Self::KnowledgeQuery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketCreation => "ticket_creation",
            Self::KnowledgeQuery => "knowledge_query",
            Self::ExternalAgent => "external_agent",
            Self::GeneralChat => "general_chat",
        }
    }

    /// Parses a label returned by the remote classifier. Only the three
    /// labels the classifier is prompted with are accepted.
    pub fn from_classifier_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
        match label.to_ascii_lowercase().as_str() {
            "ticket_creation" => Some(Self::TicketCreation),
            "knowledge_query" => Some(Self::KnowledgeQuery),
            "general_chat" => Some(Self::GeneralChat),
            _ => None,
        }
    }

    pub fn handler(&self) -> HandlerId {
        match self {
            Self::TicketCreation => HandlerId::Ticket,
            Self::KnowledgeQuery => HandlerId::Wiki,
            Self::ExternalAgent => HandlerId::AgentPlatform,
            Self::GeneralChat => HandlerId::Chat,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    Ticket,
    Wiki,
    AgentPlatform,
    Chat,
}

impl HandlerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::Wiki => "wiki",
            Self::AgentPlatform => "agent_platform",
            Self::Chat => "chat",
        }
    }

    /// Handlers that run a remote tool through the invocation pipeline.
    pub fn invokes_tools(&self) -> bool {
        matches!(self, Self::Ticket | Self::Wiki)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{HandlerId, Intent};

    #[test]
    fn classifier_labels_are_trimmed_and_case_insensitive() {
        assert_eq!(Intent::from_classifier_label(" Ticket_Creation\n"), Some(Intent::TicketCreation));
        assert_eq!(Intent::from_classifier_label("\"knowledge_query\""), Some(Intent::KnowledgeQuery));
        assert_eq!(Intent::from_classifier_label("general_chat."), Some(Intent::GeneralChat));
    }

    #[test]
    fn unknown_or_unoffered_labels_are_rejected() {
        assert_eq!(Intent::from_classifier_label("billing"), None);
        assert_eq!(Intent::from_classifier_label(""), None);
        assert_eq!(Intent::from_classifier_label("external_agent"), None);
        assert_eq!(Intent::from_classifier_label("ticket creation"), None);
    }

    #[test]
    fn intents_map_to_handlers() {
        assert_eq!(Intent::TicketCreation.handler(), HandlerId::Ticket);
        assert_eq!(Intent::KnowledgeQuery.handler(), HandlerId::Wiki);
        assert_eq!(Intent::ExternalAgent.handler(), HandlerId::AgentPlatform);
        assert_eq!(Intent::GeneralChat.handler(), HandlerId::Chat);
        assert!(HandlerId::Wiki.invokes_tools());
        assert!(!HandlerId::Chat.invokes_tools());
    }
}
