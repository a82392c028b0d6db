use std::sync::Arc;
use std::time::{Duration, Instant};

use deskpilot_core::config::RoutingConfig;
use deskpilot_core::{HandlerId, Intent};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm::{classification_prompt, LlmClient};

/// Phrases for one intent category, pre-tokenized for word-boundary matching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordSet {
    phrases: Vec<Vec<String>>,
}

impl KeywordSet {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|phrase| tokenize(phrase.as_ref()))
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Self { phrases }
    }

    /// First phrase that occurs as a contiguous token run in `tokens`.
    pub fn find(&self, tokens: &[String]) -> Option<String> {
        self.phrases
            .iter()
            .find(|phrase| tokens.windows(phrase.len()).any(|window| window == phrase.as_slice()))
            .map(|phrase| phrase.join(" "))
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// One keyword pass: categories checked in `Intent::PRIORITY` order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordLayer {
    pub ticket: KeywordSet,
    pub external_agent: KeywordSet,
    pub knowledge: KeywordSet,
}

impl KeywordLayer {
    fn set_for(&self, intent: Intent) -> Option<&KeywordSet> {
        match intent {
            Intent::TicketCreation => Some(&self.ticket),
            Intent::ExternalAgent => Some(&self.external_agent),
            Intent::KnowledgeQuery => Some(&self.knowledge),
            Intent::GeneralChat => None,
        }
    }

    pub fn classify(&self, tokens: &[String]) -> Option<(Intent, String)> {
        Intent::PRIORITY.into_iter().find_map(|intent| {
            self.set_for(intent).and_then(|set| set.find(tokens)).map(|keyword| (intent, keyword))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterSettings {
    pub classification_timeout: Duration,
    pub remote_classification: bool,
    pub strict: KeywordLayer,
    pub loose: KeywordLayer,
}

impl From<&RoutingConfig> for RouterSettings {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            classification_timeout: config.classification_timeout(),
            remote_classification: config.remote_classification,
            strict: KeywordLayer {
                ticket: KeywordSet::new(&config.ticket_keywords),
                external_agent: KeywordSet::new(&config.agent_keywords),
                knowledge: KeywordSet::new(&config.knowledge_keywords),
            },
            loose: KeywordLayer {
                ticket: KeywordSet::new(&config.fallback_ticket_keywords),
                external_agent: KeywordSet::default(),
                knowledge: KeywordSet::new(&config.fallback_knowledge_keywords),
            },
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&RoutingConfig::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStage {
    KeywordCheck,
    RemoteClassify,
    KeywordFallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Keyword,
    Remote,
    FallbackKeyword,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// No classifier configured or remote classification disabled.
    Unavailable,
    Recognized { label: String },
    Unrecognized { label: String },
    TimedOut { after_ms: u64 },
    Failed { error: String },
}

/// The intent for one turn plus how it was reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub intent: Intent,
    pub handler: HandlerId,
    pub source: DecisionSource,
    pub stages: Vec<RouteStage>,
    pub matched_keyword: Option<String>,
    pub remote: Option<RemoteOutcome>,
}

struct KeywordScan {
    strong: Option<(Intent, String)>,
    weak: Option<(Intent, String)>,
}

pub struct IntentRouter {
    settings: RouterSettings,
    classifier: Option<Arc<dyn LlmClient>>,
}

impl IntentRouter {
    pub fn new(settings: RouterSettings, classifier: Option<Arc<dyn LlmClient>>) -> Self {
        Self { settings, classifier }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub async fn classify(&self, text: &str) -> Intent {
        self.route(text, "unassigned").await.intent
    }

    /// Decides the intent for `text`. Never fails: the worst case is
    /// `GeneralChat` after the classification deadline elapsed.
    pub async fn route(&self, text: &str, correlation_id: &str) -> RoutingDecision {
        let started = Instant::now();
        let scan = self.scan(text);

        if let Some((intent, keyword)) = scan.strong {
            let decision = RoutingDecision {
                intent,
                handler: intent.handler(),
                source: DecisionSource::Keyword,
                stages: vec![RouteStage::KeywordCheck],
                matched_keyword: Some(keyword),
                remote: None,
            };
            log_decision(&decision, correlation_id, started);
            return decision;
        }

        let mut stages = vec![RouteStage::KeywordCheck];
        let remote = match self.active_classifier() {
            Some(classifier) => {
                stages.push(RouteStage::RemoteClassify);
                self.ask_classifier(classifier, text, correlation_id).await
            }
            None => RemoteOutcome::Unavailable,
        };

        let remote_intent = match &remote {
            RemoteOutcome::Recognized { label } => Intent::from_classifier_label(label),
            _ => None,
        };
        if let Some(intent) = remote_intent {
            let decision = RoutingDecision {
                intent,
                handler: intent.handler(),
                source: DecisionSource::Remote,
                stages,
                matched_keyword: None,
                remote: Some(remote),
            };
            log_decision(&decision, correlation_id, started);
            return decision;
        }

        let decision = fallback(scan.weak, stages, remote);
        log_decision(&decision, correlation_id, started);
        decision
    }

    /// Keyword layers only, treating the remote classifier as unavailable.
    pub fn route_offline(&self, text: &str) -> RoutingDecision {
        let scan = self.scan(text);
        match scan.strong {
            Some((intent, keyword)) => RoutingDecision {
                intent,
                handler: intent.handler(),
                source: DecisionSource::Keyword,
                stages: vec![RouteStage::KeywordCheck],
                matched_keyword: Some(keyword),
                remote: None,
            },
            None => fallback(scan.weak, vec![RouteStage::KeywordCheck], RemoteOutcome::Unavailable),
        }
    }

    fn scan(&self, text: &str) -> KeywordScan {
        let tokens = tokenize(text);
        KeywordScan {
            strong: self.settings.strict.classify(&tokens),
            weak: self.settings.loose.classify(&tokens),
        }
    }

    fn active_classifier(&self) -> Option<&Arc<dyn LlmClient>> {
        self.classifier.as_ref().filter(|_| self.settings.remote_classification)
    }

    async fn ask_classifier(
        &self,
        classifier: &Arc<dyn LlmClient>,
        text: &str,
        correlation_id: &str,
    ) -> RemoteOutcome {
        let deadline = self.settings.classification_timeout;
        let prompt = classification_prompt(text);

        // Dropping the future on timeout abandons the request; its answer can
        // never be observed afterwards.
        match tokio::time::timeout(deadline, classifier.complete(&prompt)).await {
            Ok(Ok(label)) => {
                let label = label.trim().to_string();
                if Intent::from_classifier_label(&label).is_some() {
                    RemoteOutcome::Recognized { label }
                } else {
                    warn!(
                        event_name = "agent.router.remote_unrecognized",
                        correlation_id = %correlation_id,
                        label = %label,
                        "remote classifier returned an unrecognized label"
                    );
                    RemoteOutcome::Unrecognized { label }
                }
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "agent.router.remote_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "remote classification failed"
                );
                RemoteOutcome::Failed { error: error.to_string() }
            }
            Err(_) => {
                let after_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    event_name = "agent.router.remote_timeout",
                    correlation_id = %correlation_id,
                    timeout_ms = after_ms,
                    "remote classification abandoned after deadline"
                );
                RemoteOutcome::TimedOut { after_ms }
            }
        }
    }
}

fn fallback(
    weak: Option<(Intent, String)>,
    mut stages: Vec<RouteStage>,
    remote: RemoteOutcome,
) -> RoutingDecision {
    stages.push(RouteStage::KeywordFallback);
    let (intent, source, matched_keyword) = match weak {
        Some((intent, keyword)) => (intent, DecisionSource::FallbackKeyword, Some(keyword)),
        None => (Intent::GeneralChat, DecisionSource::Default, None),
    };
    RoutingDecision {
        intent,
        handler: intent.handler(),
        source,
        stages,
        matched_keyword,
        remote: Some(remote),
    }
}

fn log_decision(decision: &RoutingDecision, correlation_id: &str, started: Instant) {
    info!(
        event_name = "agent.router.decided",
        correlation_id = %correlation_id,
        intent = %decision.intent,
        handler = %decision.handler,
        source = ?decision.source,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "intent decided"
    );
    debug!(
        event_name = "agent.router.trace",
        correlation_id = %correlation_id,
        stages = ?decision.stages,
        matched_keyword = decision.matched_keyword.as_deref().unwrap_or(""),
        "routing trace"
    );
}

/// Lowercases and splits on anything that is not a letter or digit.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() {
            sanitized.extend(character.to_lowercase());
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use deskpilot_core::{HandlerId, Intent};

    use super::{
        tokenize, DecisionSource, IntentRouter, KeywordSet, RemoteOutcome, RouteStage,
        RouterSettings,
    };
    use crate::llm::LlmClient;

    struct FixedLabel {
        label: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FixedLabel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.label.to_string())
        }
    }

    struct NeverAnswers;

    #[async_trait]
    impl LlmClient for NeverAnswers {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            std::future::pending::<()>().await;
            Ok("ticket_creation".to_string())
        }
    }

    struct SlowAnswer {
        delay: Duration,
        answered: Arc<AtomicBool>,
    }

    #[async_trait]
    impl LlmClient for SlowAnswer {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            self.answered.store(true, Ordering::SeqCst);
            Ok("ticket_creation".to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl LlmClient for Broken {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn settings(timeout: Duration) -> RouterSettings {
        RouterSettings { classification_timeout: timeout, ..RouterSettings::default() }
    }

    fn router_with(classifier: Arc<dyn LlmClient>, timeout: Duration) -> IntentRouter {
        IntentRouter::new(settings(timeout), Some(classifier))
    }

    #[test]
    fn tokenize_splits_on_punctuation_and_lowercases() {
        assert_eq!(tokenize("Open a TICKET, please!"), vec!["open", "a", "ticket", "please"]);
    }

    #[test]
    fn keyword_phrases_match_on_word_boundaries() {
        let set = KeywordSet::new(["show", "report a problem"]);
        assert_eq!(set.find(&tokenize("how are you")), None);
        assert_eq!(set.find(&tokenize("Show me")), Some("show".to_string()));
        assert_eq!(
            set.find(&tokenize("I want to report a problem.")),
            Some("report a problem".to_string())
        );
        assert_eq!(set.find(&tokenize("report the problem")), None);
        assert!(KeywordSet::new(["", "  "]).is_empty());
    }

    #[tokio::test]
    async fn keyword_hit_decides_without_calling_the_classifier() {
        let classifier = Arc::new(FixedLabel { label: "general_chat", calls: AtomicUsize::new(0) });
        let router = router_with(classifier.clone(), Duration::from_secs(5));

        let started = Instant::now();
        let decision = router.route("please open a ticket for the printer", "turn-1").await;

        assert_eq!(decision.intent, Intent::TicketCreation);
        assert_eq!(decision.handler, HandlerId::Ticket);
        assert_eq!(decision.source, DecisionSource::Keyword);
        assert_eq!(decision.stages, vec![RouteStage::KeywordCheck]);
        assert_eq!(decision.matched_keyword.as_deref(), Some("ticket"));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn keyword_ties_follow_category_priority() {
        let router = IntentRouter::new(RouterSettings::default(), None);

        let both = router.classify("check the wiki and open a ticket").await;
        assert_eq!(both, Intent::TicketCreation);

        let agent = router.classify("docs are stale, ask the agent").await;
        assert_eq!(agent, Intent::ExternalAgent);
    }

    #[tokio::test]
    async fn recognized_remote_label_decides() {
        let classifier =
            Arc::new(FixedLabel { label: " Knowledge_Query\n", calls: AtomicUsize::new(0) });
        let router = router_with(classifier.clone(), Duration::from_secs(5));

        let decision = router.route("my laptop makes a weird noise", "turn-2").await;

        assert_eq!(decision.intent, Intent::KnowledgeQuery);
        assert_eq!(decision.source, DecisionSource::Remote);
        assert_eq!(decision.stages, vec![RouteStage::KeywordCheck, RouteStage::RemoteClassify]);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrecognized_label_falls_back_to_loose_keywords() {
        let classifier = Arc::new(FixedLabel { label: "billing", calls: AtomicUsize::new(0) });
        let router = router_with(classifier, Duration::from_secs(5));

        let decision = router.route("the vpn client is broken again", "turn-3").await;

        assert_eq!(decision.intent, Intent::TicketCreation);
        assert_eq!(decision.source, DecisionSource::FallbackKeyword);
        assert_eq!(decision.matched_keyword.as_deref(), Some("broken"));
        assert_eq!(
            decision.remote,
            Some(RemoteOutcome::Unrecognized { label: "billing".to_string() })
        );
    }

    #[tokio::test]
    async fn classifier_error_with_no_keywords_defaults_to_general_chat() {
        let router = router_with(Arc::new(Broken), Duration::from_secs(5));

        let decision = router.route("good morning!", "turn-4").await;

        assert_eq!(decision.intent, Intent::GeneralChat);
        assert_eq!(decision.handler, HandlerId::Chat);
        assert_eq!(decision.source, DecisionSource::Default);
        assert_eq!(
            decision.stages,
            vec![RouteStage::KeywordCheck, RouteStage::RemoteClassify, RouteStage::KeywordFallback]
        );
        assert!(matches!(decision.remote, Some(RemoteOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn hung_classifier_is_bounded_by_the_deadline() {
        let timeout = Duration::from_millis(50);
        let router = router_with(Arc::new(NeverAnswers), timeout);

        let started = Instant::now();
        let decision = router.route("how do I reset my password", "turn-5").await;

        assert!(started.elapsed() < timeout + Duration::from_secs(1));
        assert_eq!(decision.intent, Intent::KnowledgeQuery);
        assert_eq!(decision.source, DecisionSource::FallbackKeyword);
        assert_eq!(decision.matched_keyword.as_deref(), Some("how"));
        assert_eq!(decision.remote, Some(RemoteOutcome::TimedOut { after_ms: 50 }));
    }

    #[tokio::test]
    async fn late_answer_is_abandoned_not_applied() {
        let answered = Arc::new(AtomicBool::new(false));
        let classifier =
            Arc::new(SlowAnswer { delay: Duration::from_millis(200), answered: answered.clone() });
        let router = router_with(classifier, Duration::from_millis(20));

        let decision = router.route("hello there", "turn-6").await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(decision.intent, Intent::GeneralChat);
        assert!(!answered.load(Ordering::SeqCst), "abandoned request must not run to completion");
    }

    #[tokio::test]
    async fn disabled_remote_classification_skips_the_classifier() {
        let classifier =
            Arc::new(FixedLabel { label: "ticket_creation", calls: AtomicUsize::new(0) });
        let router = IntentRouter::new(
            RouterSettings { remote_classification: false, ..RouterSettings::default() },
            Some(classifier.clone() as Arc<dyn LlmClient>),
        );

        let decision = router.route("how do I reset my password", "turn-7").await;

        assert_eq!(decision.intent, Intent::KnowledgeQuery);
        assert_eq!(decision.remote, Some(RemoteOutcome::Unavailable));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn offline_routing_uses_keyword_layers_only() {
        let router = IntentRouter::new(RouterSettings::default(), None);

        assert_eq!(router.route_offline("where is the jira board").intent, Intent::TicketCreation);
        assert_eq!(router.route_offline("explain the VPN setup").intent, Intent::KnowledgeQuery);
        let chat = router.route_offline("thanks!");
        assert_eq!(chat.intent, Intent::GeneralChat);
        assert_eq!(chat.source, DecisionSource::Default);
    }
}
