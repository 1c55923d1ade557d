//! Built-in prompt templates, overridable per deployment via config.

use careline_config::PromptOverrides;

/// Consultation persona and guidelines. Sent as the first system entry of
/// every generated turn.
pub const SYSTEM_PROMPT: &str = "당신은 통신 요금제 전문 AI 상담원입니다.

[역할]
- 5G/LTE 요금제에 대한 상담 및 추천
- 고객의 사용 패턴에 맞는 최적의 요금제 안내

[상담 가이드라인]
1. 고객에게 필요한 정보를 적극적으로 질문하세요
   - \"월 평균 데이터 사용량이 어떻게 되시나요?\"
   - \"주로 어떤 용도로 데이터를 사용하시나요?\"
   - \"데이터 이월 기능이 필요하신가요?\"

2. 고객 정보를 활용한 맞춤 추천
   - 현재 요금제 대비 절약 가능 금액 안내
   - 고객 나이에 맞는 연령별 요금제 안내 (Y, Y틴, 주니어, 시니어 등)

3. 요금제 외 문의 또는 해결 불가 시
   - \"해당 문의는 전문 상담원 연결이 필요합니다. 상담원 연결을 원하시면 '상담원 연결'이라고 말씀해 주세요.\"
   - 명의 변경, 요금 납부, 분실 신고 등은 상담원 연결 안내

4. 항상 친절하고 전문적인 어조를 유지하세요.
5. 답변은 간결하고 명확하게 해주세요.
";

/// Summarization instruction for session close.
pub const SUMMARY_PROMPT: &str = "다음은 통신 요금제 상담 대화 내용입니다. 이 대화를 간결하게 요약해주세요.

요약에 포함할 내용:
1. 고객의 주요 문의 사항
2. 상담원이 제공한 주요 정보/추천 내용
3. 상담 결과 (해결 여부, 추가 조치 필요 여부)

요약은 3-5문장으로 작성해주세요.
";

pub fn system_prompt(overrides: &PromptOverrides) -> String {
    overrides
        .system
        .clone()
        .unwrap_or_else(|| SYSTEM_PROMPT.to_string())
}

pub fn summary_prompt(overrides: &PromptOverrides) -> String {
    overrides
        .summary
        .clone()
        .unwrap_or_else(|| SUMMARY_PROMPT.to_string())
}
