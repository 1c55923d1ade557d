//! Keyword-based escalation classifier.
//!
//! Pure and synchronous: no store access, no LLM call. A matched turn is
//! terminal for the pipeline; the reply comes from the policy templates,
//! never from generation.

use careline_config::EscalationPolicy;

/// Why a turn was handed off to a human agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// The customer asked for a human agent outright.
    DirectRequest { reply: String },

    /// The message touched a topic the assistant must not handle.
    PolicyTopic { keyword: String, reply: String },
}

impl EscalationOutcome {
    pub fn reply(&self) -> &str {
        match self {
            EscalationOutcome::DirectRequest { reply } => reply,
            EscalationOutcome::PolicyTopic { reply, .. } => reply,
        }
    }
}

/// Matches incoming messages against the configured keyword lists.
///
/// Matching is case-insensitive substring containment, in list order.
/// Direct-request keywords always take priority over policy topics, and
/// within a list the first match wins.
pub struct EscalationClassifier {
    direct_keywords: Vec<String>,
    direct_reply: String,
    policy_keywords: Vec<String>,
    policy_reply_template: String,
}

impl EscalationClassifier {
    pub fn new(policy: EscalationPolicy) -> Self {
        // Keywords are lowercased once here; messages at classify time.
        Self {
            direct_keywords: lowercase_all(policy.direct_keywords),
            direct_reply: policy.direct_reply,
            policy_keywords: lowercase_all(policy.policy_keywords),
            policy_reply_template: policy.policy_reply_template,
        }
    }

    /// Classify one message. `None` means the turn proceeds to generation.
    pub fn classify(&self, message: &str) -> Option<EscalationOutcome> {
        let message = message.to_lowercase();

        for keyword in &self.direct_keywords {
            if message.contains(keyword.as_str()) {
                return Some(EscalationOutcome::DirectRequest {
                    reply: self.direct_reply.clone(),
                });
            }
        }

        for keyword in &self.policy_keywords {
            if message.contains(keyword.as_str()) {
                return Some(EscalationOutcome::PolicyTopic {
                    keyword: keyword.clone(),
                    reply: self.policy_reply_template.replace("{keyword}", keyword),
                });
            }
        }

        None
    }
}

fn lowercase_all(keywords: Vec<String>) -> Vec<String> {
    keywords.into_iter().map(|k| k.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> EscalationClassifier {
        EscalationClassifier::new(EscalationPolicy::default())
    }

    #[test]
    fn plain_plan_question_passes_through() {
        assert_eq!(classifier().classify("데이터 무제한 요금제 추천해 주세요"), None);
    }

    #[test]
    fn human_agent_request_is_direct() {
        let outcome = classifier().classify("상담원 연결해 주세요").unwrap();
        assert!(matches!(outcome, EscalationOutcome::DirectRequest { .. }));
        assert!(outcome.reply().contains("전문 상담원과 연결"));
    }

    #[test]
    fn direct_request_beats_policy_topic() {
        // Mentions both a policy topic (해지) and a human request (상담원).
        let outcome = classifier().classify("해지 때문에 상담원 바꿔주세요").unwrap();
        assert!(matches!(outcome, EscalationOutcome::DirectRequest { .. }));
    }

    #[test]
    fn policy_topic_names_the_matched_keyword() {
        let outcome = classifier().classify("분실 신고는 어떻게 하나요?").unwrap();
        match outcome {
            EscalationOutcome::PolicyTopic { keyword, reply } => {
                assert_eq!(keyword, "분실 신고");
                assert!(reply.contains("'분실 신고'"));
            }
            other => panic!("expected policy topic, got {other:?}"),
        }
    }

    #[test]
    fn ascii_keywords_match_case_insensitively() {
        let outcome = classifier().classify("휴대폰 A/S 받고 싶어요").unwrap();
        assert!(matches!(
            outcome,
            EscalationOutcome::PolicyTopic { keyword, .. } if keyword == "a/s"
        ));
    }

    #[test]
    fn first_match_in_list_order_wins() {
        // "명의 변경" precedes "번호 변경" in the default list.
        let outcome = classifier().classify("명의 변경하면서 번호 변경도 할래요").unwrap();
        assert!(matches!(
            outcome,
            EscalationOutcome::PolicyTopic { keyword, .. } if keyword == "명의 변경"
        ));
    }

    #[test]
    fn custom_template_renders_keyword() {
        let mut policy = EscalationPolicy::default();
        policy.policy_reply_template = "{keyword} 문의는 지원하지 않습니다.".into();
        let classifier = EscalationClassifier::new(policy);
        let outcome = classifier.classify("위약금 알려줘").unwrap();
        assert_eq!(outcome.reply(), "위약금 문의는 지원하지 않습니다.");
    }
}
