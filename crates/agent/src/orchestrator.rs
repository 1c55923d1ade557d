//! The consultation orchestrator — authentication and per-turn processing.
//!
//! `process_message` is the receive → classify → contextualize → generate →
//! persist pipeline. Persistence rules:
//!
//! - escalated turn: user message and fixed notice are both stored
//! - generated turn: the user message is stored before the provider call,
//!   so a failed generation still leaves the customer's words on record
//! - the assistant reply is stored only after generation succeeds

use std::sync::Arc;

use careline_config::EscalationPolicy;
use careline_core::docstore::DocumentStore;
use careline_core::domain::{ChatSession, Customer, Role};
use careline_core::provider::{ChatRequest, PromptMessage, Provider};
use careline_core::store::ChatStore;
use careline_core::{Error, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::context::ContextAssembler;
use crate::escalation::{EscalationClassifier, EscalationOutcome};

/// Conversation turns included from history, beyond the current message.
const HISTORY_LIMIT: usize = 10;

const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 1000;

/// Result of authenticating a phone number: the (possibly new) customer,
/// a fresh open session, and the persisted greeting.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub customer: Customer,
    pub session: ChatSession,
    pub is_new_customer: bool,
    pub greeting: String,
}

/// What one processed turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn matched the escalation policy; the reply is a fixed notice.
    Escalated(EscalationOutcome),

    /// The turn went through retrieval and generation.
    Answered { reply: String },
}

impl TurnOutcome {
    pub fn reply(&self) -> &str {
        match self {
            TurnOutcome::Escalated(outcome) => outcome.reply(),
            TurnOutcome::Answered { reply } => reply,
        }
    }

    /// Whether the caller should be routed to a human agent.
    pub fn requires_human(&self) -> bool {
        matches!(self, TurnOutcome::Escalated(_))
    }
}

/// Drives consultation sessions end to end.
pub struct Consultant {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn Provider>,
    classifier: EscalationClassifier,
    assembler: ContextAssembler,
    model: String,
    system_prompt: String,
}

impl Consultant {
    pub fn new(
        store: Arc<dyn ChatStore>,
        documents: Arc<dyn DocumentStore>,
        provider: Arc<dyn Provider>,
        policy: EscalationPolicy,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            classifier: EscalationClassifier::new(policy),
            assembler: ContextAssembler::new(documents),
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Authenticate a caller by phone number.
    ///
    /// Unknown numbers are registered as non-member customers. Always opens
    /// a fresh session and persists the greeting as its first turn.
    pub async fn authenticate(&self, phone_number: &str) -> Result<AuthOutcome> {
        let phone = phone_number.trim();
        if phone.is_empty() {
            return Err(Error::Validation("phone_number must not be empty".into()));
        }

        let (customer, is_new_customer) = match self.store.find_customer_by_phone(phone).await? {
            Some(existing) => (existing, false),
            None => (self.store.create_customer(phone, None).await?, true),
        };

        let session = self.store.create_session(customer.id).await?;
        let greeting = greeting_for(&customer);
        self.store
            .append_message(session.id, Role::Assistant, &greeting)
            .await?;

        info!(
            customer_id = customer.id,
            session_id = session.id,
            new_customer = is_new_customer,
            "Session opened"
        );

        Ok(AuthOutcome {
            customer,
            session,
            is_new_customer,
            greeting,
        })
    }

    /// Process one user turn in an open session.
    pub async fn process_message(&self, session_id: i64, text: &str) -> Result<TurnOutcome> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        if session.is_closed() {
            return Err(Error::SessionClosed(session_id));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message must not be empty".into()));
        }

        if let Some(outcome) = self.classifier.classify(text) {
            self.store.append_message(session_id, Role::User, text).await?;
            self.store
                .append_message(session_id, Role::Assistant, outcome.reply())
                .await?;
            info!(session_id, "Turn escalated to a human agent");
            return Ok(TurnOutcome::Escalated(outcome));
        }

        // Snapshot history first so the current message appears in the
        // prompt exactly once.
        let history = self.store.recent_messages(session_id, HISTORY_LIMIT).await?;
        self.store.append_message(session_id, Role::User, text).await?;

        let customer = self
            .store
            .find_customer(session.customer_id)
            .await?
            .ok_or_else(|| Error::CustomerNotFound(session.customer_id.to_string()))?;
        let context = self
            .assembler
            .assemble(&customer, text, Utc::now().date_naive())
            .await?;

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(PromptMessage::system(self.system_prompt.clone()));
        messages.push(PromptMessage::system(context));
        messages.extend(history.into_iter().map(|m| PromptMessage {
            role: m.role.into(),
            content: m.content,
        }));
        messages.push(PromptMessage::user(text));

        let response = self
            .provider
            .complete(ChatRequest {
                model: self.model.clone(),
                messages,
                temperature: CHAT_TEMPERATURE,
                max_tokens: Some(CHAT_MAX_TOKENS),
            })
            .await?;

        self.store
            .append_message(session_id, Role::Assistant, &response.content)
            .await?;
        debug!(session_id, model = %response.model, "Turn answered");

        Ok(TurnOutcome::Answered {
            reply: response.content,
        })
    }
}

/// The session-opening greeting, varying by membership.
fn greeting_for(customer: &Customer) -> String {
    let mut greeting = String::from(
        "안녕하세요, Careline AI 상담원입니다. 요금제 관련 상담을 도와드리겠습니다.\n\
         상담 중 언제든지 '상담원 연결'이라고 말씀하시면 전문 상담원과 연결해 드립니다.\n\n",
    );

    if customer.is_member {
        let name = customer.name.as_deref().unwrap_or("고객");
        greeting.push_str(&format!("{name}님, 이용해 주셔서 감사합니다.\n"));
        if let Some(plan) = &customer.current_plan {
            greeting.push_str(&format!("현재 사용 중이신 요금제는 '{plan}'입니다.\n"));
        }
        greeting.push_str("\n무엇을 도와드릴까요?");
    } else {
        greeting.push_str(
            "요금제에 대해 궁금하신 점을 말씀해 주세요.\n고객님께 맞는 요금제를 안내해 드리겠습니다.",
        );
    }

    greeting
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::SYSTEM_PROMPT;
    use crate::test_helpers::{FailingProvider, ScriptedProvider};
    use async_trait::async_trait;
    use careline_core::domain::{ChatMessage, NewCustomer};
    use careline_core::error::StoreError;
    use careline_core::provider::PromptRole;
    use careline_store::{InMemoryDocumentStore, SqliteStore};
    use chrono::{DateTime, NaiveDate};

    async fn consultant_with(provider: Arc<dyn Provider>) -> (Consultant, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let consultant = Consultant::new(
            store.clone(),
            Arc::new(InMemoryDocumentStore::new()),
            provider,
            EscalationPolicy::default(),
            "gpt-4",
            SYSTEM_PROMPT,
        );
        (consultant, store)
    }

    async fn seed_member(store: &SqliteStore) {
        store
            .insert_customer(NewCustomer {
                phone_number: "01012345678".into(),
                name: Some("김철수".into()),
                birth_date: NaiveDate::from_ymd_opt(1990, 5, 15),
                is_member: true,
                current_plan: Some("5G 슬림".into()),
                subscription_date: NaiveDate::from_ymd_opt(2023, 3, 10),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_phone_registers_non_member() {
        let (consultant, store) = consultant_with(Arc::new(ScriptedProvider::new(vec![]))).await;

        let outcome = consultant.authenticate("01099998888").await.unwrap();
        assert!(outcome.is_new_customer);
        assert!(!outcome.customer.is_member);
        assert!(outcome.greeting.contains("요금제에 대해 궁금하신 점을 말씀해 주세요"));

        // The greeting is the session's first persisted turn.
        let messages = store.list_messages(outcome.session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, outcome.greeting);
    }

    #[tokio::test]
    async fn member_greeting_names_customer_and_plan() {
        let (consultant, store) = consultant_with(Arc::new(ScriptedProvider::new(vec![]))).await;
        seed_member(&store).await;

        let outcome = consultant.authenticate("01012345678").await.unwrap();
        assert!(!outcome.is_new_customer);
        assert!(outcome.greeting.contains("김철수님"));
        assert!(outcome.greeting.contains("'5G 슬림'"));
        assert!(outcome.greeting.contains("무엇을 도와드릴까요?"));
    }

    #[tokio::test]
    async fn blank_phone_is_rejected() {
        let (consultant, _) = consultant_with(Arc::new(ScriptedProvider::new(vec![]))).await;
        let err = consultant.authenticate("   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn escalated_turn_skips_generation_but_persists_both_sides() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (consultant, store) = consultant_with(provider.clone()).await;

        let auth = consultant.authenticate("01099998888").await.unwrap();
        let outcome = consultant
            .process_message(auth.session.id, "상담원 연결해 주세요")
            .await
            .unwrap();

        assert!(outcome.requires_human());
        assert_eq!(provider.call_count(), 0);

        let messages = store.list_messages(auth.session.id).await.unwrap();
        // greeting + user + notice
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].content, outcome.reply());
    }

    #[tokio::test]
    async fn generated_turn_builds_prompt_in_order() {
        let provider = Arc::new(ScriptedProvider::single("5G 슬림을 추천드립니다."));
        let (consultant, store) = consultant_with(provider.clone()).await;
        seed_member(&store).await;

        let auth = consultant.authenticate("01012345678").await.unwrap();
        let outcome = consultant
            .process_message(auth.session.id, "데이터 요금제 추천해 주세요")
            .await
            .unwrap();

        assert!(!outcome.requires_human());
        assert_eq!(outcome.reply(), "5G 슬림을 추천드립니다.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages;
        assert_eq!(prompt[0].role, PromptRole::System);
        assert_eq!(prompt[0].content, SYSTEM_PROMPT);
        assert_eq!(prompt[1].role, PromptRole::System);
        assert!(prompt[1].content.contains("[고객 정보]"));
        // History carries the greeting; the current message closes the prompt.
        assert_eq!(prompt[2].role, PromptRole::Assistant);
        assert_eq!(prompt.last().unwrap().role, PromptRole::User);
        assert_eq!(prompt.last().unwrap().content, "데이터 요금제 추천해 주세요");
        // The current message appears exactly once.
        let occurrences = prompt
            .iter()
            .filter(|m| m.content == "데이터 요금제 추천해 주세요")
            .count();
        assert_eq!(occurrences, 1);

        let messages = store.list_messages(auth.session.id).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content, "5G 슬림을 추천드립니다.");
    }

    #[tokio::test]
    async fn failed_generation_keeps_the_user_turn() {
        let (consultant, store) = consultant_with(Arc::new(FailingProvider)).await;

        let auth = consultant.authenticate("01099998888").await.unwrap();
        let err = consultant
            .process_message(auth.session.id, "요금제 알려줘")
            .await
            .unwrap_err();
        assert!(err.is_upstream());

        let messages = store.list_messages(auth.session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "요금제 알려줘");
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let (consultant, _) = consultant_with(Arc::new(ScriptedProvider::new(vec![]))).await;
        let err = consultant.process_message(999, "안녕하세요").await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(999)));
    }

    #[tokio::test]
    async fn closed_session_rejects_new_turns() {
        let (consultant, store) = consultant_with(Arc::new(ScriptedProvider::new(vec![]))).await;
        let auth = consultant.authenticate("01099998888").await.unwrap();
        store
            .close_session(auth.session.id, Utc::now(), "요약")
            .await
            .unwrap();
        let before = store.list_messages(auth.session.id).await.unwrap().len();

        let err = consultant
            .process_message(auth.session.id, "아직 있나요?")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));

        // The rejected turn leaves the transcript untouched.
        let messages = store.list_messages(auth.session.id).await.unwrap();
        assert_eq!(messages.len(), before);
    }

    /// Delegates to SQLite but loses every customer row, simulating a
    /// session whose customer reference dangles.
    struct MissingCustomerStore(Arc<SqliteStore>);

    #[async_trait]
    impl ChatStore for MissingCustomerStore {
        fn name(&self) -> &str {
            "missing-customer"
        }

        async fn find_customer_by_phone(
            &self,
            phone_number: &str,
        ) -> std::result::Result<Option<Customer>, StoreError> {
            self.0.find_customer_by_phone(phone_number).await
        }

        async fn find_customer(
            &self,
            _customer_id: i64,
        ) -> std::result::Result<Option<Customer>, StoreError> {
            Ok(None)
        }

        async fn create_customer(
            &self,
            phone_number: &str,
            name: Option<&str>,
        ) -> std::result::Result<Customer, StoreError> {
            self.0.create_customer(phone_number, name).await
        }

        async fn insert_customer(
            &self,
            customer: NewCustomer,
        ) -> std::result::Result<Customer, StoreError> {
            self.0.insert_customer(customer).await
        }

        async fn create_session(
            &self,
            customer_id: i64,
        ) -> std::result::Result<ChatSession, StoreError> {
            self.0.create_session(customer_id).await
        }

        async fn find_session(
            &self,
            session_id: i64,
        ) -> std::result::Result<Option<ChatSession>, StoreError> {
            self.0.find_session(session_id).await
        }

        async fn sessions_for_customer(
            &self,
            customer_id: i64,
        ) -> std::result::Result<Vec<ChatSession>, StoreError> {
            self.0.sessions_for_customer(customer_id).await
        }

        async fn close_session(
            &self,
            session_id: i64,
            ended_at: DateTime<Utc>,
            summary: &str,
        ) -> std::result::Result<(), StoreError> {
            self.0.close_session(session_id, ended_at, summary).await
        }

        async fn append_message(
            &self,
            session_id: i64,
            role: Role,
            content: &str,
        ) -> std::result::Result<ChatMessage, StoreError> {
            self.0.append_message(session_id, role, content).await
        }

        async fn list_messages(
            &self,
            session_id: i64,
        ) -> std::result::Result<Vec<ChatMessage>, StoreError> {
            self.0.list_messages(session_id).await
        }

        async fn recent_messages(
            &self,
            session_id: i64,
            limit: usize,
        ) -> std::result::Result<Vec<ChatMessage>, StoreError> {
            self.0.recent_messages(session_id, limit).await
        }

        async fn count_messages(&self, session_id: i64) -> std::result::Result<usize, StoreError> {
            self.0.count_messages(session_id).await
        }
    }

    #[tokio::test]
    async fn dangling_customer_reference_is_not_found() {
        let inner = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let store = Arc::new(MissingCustomerStore(inner));
        let consultant = Consultant::new(
            store,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(ScriptedProvider::new(vec![])),
            EscalationPolicy::default(),
            "gpt-4",
            SYSTEM_PROMPT,
        );

        let auth = consultant.authenticate("01099998888").await.unwrap();
        let err = consultant
            .process_message(auth.session.id, "요금제 알려줘")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CustomerNotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let (consultant, _) = consultant_with(Arc::new(ScriptedProvider::new(vec![]))).await;
        let auth = consultant.authenticate("01099998888").await.unwrap();
        let err = consultant
            .process_message(auth.session.id, "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
