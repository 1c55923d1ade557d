//! Full consultation round trip over real stores and a scripted provider:
//! authenticate, ask a plan question, hit the escalation policy, close.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use careline_agent::prompts::{SUMMARY_PROMPT, SYSTEM_PROMPT};
use careline_agent::{Consultant, SessionManager, SummaryGenerator};
use careline_config::EscalationPolicy;
use careline_core::docstore::{DocumentStore, PlanFields};
use careline_core::domain::{NewCustomer, Role};
use careline_core::error::ProviderError;
use careline_core::provider::{ChatRequest, ChatResponse, Provider, Usage};
use careline_core::store::ChatStore;
use careline_store::{InMemoryDocumentStore, SqliteStore};
use chrono::NaiveDate;

/// Returns queued replies in call order and records every request.
struct QueueProvider {
    replies: Vec<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl QueueProvider {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl Provider for QueueProvider {
    fn name(&self) -> &str {
        "queue"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self.replies.get(index).expect("unexpected provider call").clone();
        Ok(ChatResponse {
            content,
            model: "mock-model".into(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

async fn seed_plan_documents(documents: &InMemoryDocumentStore) {
    for (name, fee, data, target) in [
        ("5G 슬림", "55,000원", "14GB", "전체"),
        ("5G 시니어", "44,000원", "10GB", "만 65세 이상"),
    ] {
        documents
            .upsert(
                PlanFields {
                    plan_name: name.into(),
                    monthly_fee: fee.into(),
                    data_allowance: data.into(),
                    call_allowance: "기본 제공".into(),
                    text_allowance: "기본 제공".into(),
                    target_age: target.into(),
                    benefits: String::new(),
                    additional_services: String::new(),
                }
                .into_document(),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn full_consultation_round_trip() {
    let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    let documents = Arc::new(InMemoryDocumentStore::new());
    seed_plan_documents(&documents).await;

    let provider = QueueProvider::new(&[
        "5G 시니어 요금제를 추천드립니다.",
        "고객이 시니어 요금제를 문의하여 추천을 받았고, 이후 상담원 연결을 요청했습니다.",
    ]);

    let consultant = Consultant::new(
        store.clone(),
        documents.clone(),
        provider.clone(),
        EscalationPolicy::default(),
        "gpt-4",
        SYSTEM_PROMPT,
    );
    let sessions = SessionManager::new(
        store.clone(),
        SummaryGenerator::new(provider.clone(), "gpt-4", SUMMARY_PROMPT),
    );

    store
        .insert_customer(NewCustomer {
            phone_number: "01012345678".into(),
            name: Some("박영희".into()),
            birth_date: NaiveDate::from_ymd_opt(1955, 8, 20),
            is_member: true,
            current_plan: Some("LTE 베이직".into()),
            subscription_date: NaiveDate::from_ymd_opt(2020, 1, 5),
        })
        .await
        .unwrap();

    // Authentication opens a session and persists the greeting.
    let auth = consultant.authenticate("01012345678").await.unwrap();
    assert!(!auth.is_new_customer);
    assert!(auth.greeting.contains("박영희님"));
    let session_id = auth.session.id;

    // A plan question goes through retrieval and generation.
    let turn = consultant
        .process_message(session_id, "시니어 요금제 추천해 주세요")
        .await
        .unwrap();
    assert!(!turn.requires_human());
    assert_eq!(turn.reply(), "5G 시니어 요금제를 추천드립니다.");

    {
        let requests = provider.requests.lock().unwrap();
        let chat_request = &requests[0];
        let context = &chat_request.messages[1].content;
        assert!(context.contains("[고객 정보]"));
        assert!(context.contains("- 추천 대상: 5G 시니어 요금제 (만 65세 이상)"));
        assert!(context.contains("[관련 요금제 정보]"));
        assert!(context.contains("요금제명: 5G 시니어"));
    }

    // An escalation keyword short-circuits without a provider call.
    let turn = consultant
        .process_message(session_id, "상담원 연결 부탁드립니다")
        .await
        .unwrap();
    assert!(turn.requires_human());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // Closing summarizes the whole transcript, greeting included.
    let closure = sessions.close(session_id).await.unwrap();
    assert_eq!(closure.message_count, 5);
    assert!(closure.summary.contains("상담원 연결을 요청"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    {
        let requests = provider.requests.lock().unwrap();
        let summary_request = &requests[1];
        let transcript = &summary_request.messages[1].content;
        assert!(transcript.contains("고객: 시니어 요금제 추천해 주세요"));
        assert!(transcript.contains("상담원: 5G 시니어 요금제를 추천드립니다."));
    }

    // The closed session refuses further turns and shows up in history.
    let err = consultant
        .process_message(session_id, "한 가지 더요")
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());

    let history = sessions.history("01012345678").await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_closed());

    let detail = sessions.detail(session_id).await.unwrap();
    assert_eq!(detail.messages.len(), 5);
    assert_eq!(detail.messages[0].role, Role::Assistant);
}
