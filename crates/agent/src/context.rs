//! Context assembly — the grounding block sent alongside the system prompt.
//!
//! Two sections, joined with a blank line:
//!
//! - `[고객 정보]` — profile of the authenticated customer, including an
//!   age-band recommendation hint when a birth date is on file
//! - `[관련 요금제 정보]` — the nearest plan documents for the current
//!   message, numbered, or a fixed notice when the store is empty

use std::sync::Arc;

use careline_core::docstore::{DocumentStore, ScoredDocument};
use careline_core::domain::Customer;
use careline_core::Result;
use chrono::NaiveDate;

/// Documents retrieved per turn.
pub const TOP_K: usize = 5;

/// Retrieval section placeholder when nothing comes back.
pub const NO_DOCUMENTS_NOTICE: &str = "관련 요금제 정보를 찾을 수 없습니다.";

/// Builds the per-turn grounding context from the customer profile and the
/// document store.
pub struct ContextAssembler {
    documents: Arc<dyn DocumentStore>,
}

impl ContextAssembler {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Retrieve for `query` and render the full context block.
    ///
    /// `today` anchors the age computation; callers pass the current date,
    /// tests pass a fixed one.
    pub async fn assemble(
        &self,
        customer: &Customer,
        query: &str,
        today: NaiveDate,
    ) -> Result<String> {
        let retrieved = self.documents.query(query, TOP_K).await?;
        Ok(format!(
            "{}\n\n{}",
            customer_block(customer, today),
            retrieval_block(&retrieved)
        ))
    }
}

fn customer_block(customer: &Customer, today: NaiveDate) -> String {
    let mut parts = vec!["[고객 정보]".to_string()];

    if let Some(name) = &customer.name {
        parts.push(format!("- 이름: {name}"));
    }

    if customer.is_member {
        parts.push("- 회원 여부: 예".into());
        if let Some(plan) = &customer.current_plan {
            parts.push(format!("- 현재 요금제: {plan}"));
        }
        if let Some(date) = customer.subscription_date {
            parts.push(format!("- 가입일: {}", date.format("%Y-%m-%d")));
        }
    } else {
        parts.push("- 회원 여부: 아니오 (잠재 고객)".into());
    }

    if let Some(age) = customer.age_on(today) {
        parts.push(format!("- 나이: {age}세"));
        if let Some(hint) = age_band_hint(age) {
            parts.push(format!("- 추천 대상: {hint}"));
        }
    }

    parts.join("\n")
}

fn retrieval_block(results: &[ScoredDocument]) -> String {
    if results.is_empty() {
        return NO_DOCUMENTS_NOTICE.to_string();
    }

    let mut parts = vec!["[관련 요금제 정보]".to_string()];
    for (i, scored) in results.iter().enumerate() {
        parts.push(format!("\n--- 요금제 {} ---", i + 1));
        parts.push(scored.document.text.clone());
    }
    parts.join("\n")
}

fn age_band_hint(age: i32) -> Option<&'static str> {
    if age <= 12 {
        Some("5G 주니어 요금제 (만 12세 이하)")
    } else if age <= 18 {
        Some("5G Y틴 요금제 (만 18세 이하)")
    } else if age <= 34 {
        Some("5G Y 요금제 (만 34세 이하)")
    } else if age >= 65 {
        Some("5G 시니어 요금제 (만 65세 이상)")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::docstore::PlanFields;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn member(birth_year: i32) -> Customer {
        Customer {
            id: 1,
            phone_number: "01012345678".into(),
            name: Some("김철수".into()),
            birth_date: NaiveDate::from_ymd_opt(birth_year, 1, 15),
            is_member: true,
            current_plan: Some("5G 슬림".into()),
            subscription_date: NaiveDate::from_ymd_opt(2023, 3, 10),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn member_block_lists_plan_and_subscription() {
        let block = customer_block(&member(1990), today());
        assert!(block.starts_with("[고객 정보]"));
        assert!(block.contains("- 이름: 김철수"));
        assert!(block.contains("- 회원 여부: 예"));
        assert!(block.contains("- 현재 요금제: 5G 슬림"));
        assert!(block.contains("- 가입일: 2023-03-10"));
        assert!(block.contains("- 나이: 36세"));
    }

    #[test]
    fn non_member_block_is_minimal() {
        let customer = Customer {
            name: None,
            birth_date: None,
            is_member: false,
            current_plan: None,
            subscription_date: None,
            ..member(1990)
        };
        let block = customer_block(&customer, today());
        assert_eq!(block, "[고객 정보]\n- 회원 여부: 아니오 (잠재 고객)");
    }

    #[test]
    fn age_bands_cover_edges() {
        assert_eq!(age_band_hint(12), Some("5G 주니어 요금제 (만 12세 이하)"));
        assert_eq!(age_band_hint(13), Some("5G Y틴 요금제 (만 18세 이하)"));
        assert_eq!(age_band_hint(34), Some("5G Y 요금제 (만 34세 이하)"));
        assert_eq!(age_band_hint(35), None);
        assert_eq!(age_band_hint(64), None);
        assert_eq!(age_band_hint(65), Some("5G 시니어 요금제 (만 65세 이상)"));
    }

    #[test]
    fn senior_member_gets_band_hint() {
        let block = customer_block(&member(1950), today());
        assert!(block.contains("- 추천 대상: 5G 시니어 요금제 (만 65세 이상)"));
    }

    #[test]
    fn retrieval_block_numbers_documents() {
        let documents: Vec<ScoredDocument> = ["5G 슬림", "5G 시니어"]
            .iter()
            .enumerate()
            .map(|(i, name)| ScoredDocument {
                document: PlanFields {
                    plan_name: (*name).into(),
                    monthly_fee: "55,000원".into(),
                    data_allowance: "14GB".into(),
                    call_allowance: "기본 제공".into(),
                    text_allowance: "기본 제공".into(),
                    target_age: "전체".into(),
                    benefits: String::new(),
                    additional_services: String::new(),
                }
                .into_document(),
                distance: i as f32 * 0.1,
            })
            .collect();

        let block = retrieval_block(&documents);
        assert!(block.starts_with("[관련 요금제 정보]"));
        assert!(block.contains("--- 요금제 1 ---"));
        assert!(block.contains("요금제명: 5G 슬림"));
        assert!(block.contains("--- 요금제 2 ---"));
        assert!(block.contains("요금제명: 5G 시니어"));
    }

    #[test]
    fn empty_retrieval_yields_fixed_notice() {
        assert_eq!(retrieval_block(&[]), NO_DOCUMENTS_NOTICE);
    }
}
