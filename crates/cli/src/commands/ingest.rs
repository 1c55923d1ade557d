//! `careline ingest` — Crawl plan pages and load them into the document
//! store.
//!
//! For each configured source: scrape the page as markdown, extract the
//! plan fields with a deterministic LLM call, and upsert the composed
//! document. Individual failures are reported and skipped, never fatal.

use std::collections::HashSet;

use careline_config::{AppConfig, PlanSource};
use careline_core::docstore::{DocumentStore, PlanFields};
use careline_core::provider::{ChatRequest, PromptMessage, Provider};
use careline_providers::{FirecrawlClient, OpenAiChatProvider};
use careline_store::ChromaStore;
use tracing::warn;

/// Page content passed to extraction is capped to keep the prompt bounded.
const EXTRACTION_EXCERPT_CHARS: usize = 8000;

const EXTRACTION_MAX_TOKENS: u32 = 1000;

const EXTRACTION_PROMPT: &str = "다음은 통신사 요금제 웹페이지에서 크롤링한 내용입니다.
이 내용에서 요금제 정보를 추출하여 JSON 형식으로 반환해주세요.

추출할 정보:
- plan_name: 요금제명
- monthly_fee: 월정액 (여러 옵션이 있으면 범위로 표시, 예: \"30,000원~69,000원\")
- data_allowance: 데이터량 (예: \"무제한\", \"30GB~110GB\")
- call_allowance: 통화 제공량 (예: \"기본 제공\", \"무제한\")
- text_allowance: 문자 제공량 (예: \"기본 제공\", \"무제한\")
- target_age: 대상 연령/자격 조건 (예: \"전체\", \"만 34세 이하\", \"만 65세 이상\")
- benefits: 주요 혜택/특징 (콤마로 구분)
- additional_services: 부가서비스 (콤마로 구분)

JSON 형식으로만 응답해주세요. 다른 설명 없이 JSON만 출력하세요.
";

pub async fn run(refresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.ingest.sources.is_empty() {
        println!("No plan sources configured — add [[ingest.sources]] entries to careline.toml");
        return Ok(());
    }

    let documents = ChromaStore::from_config(&config.document_store);
    let crawler = FirecrawlClient::from_config(&config.firecrawl)?;
    let provider = OpenAiChatProvider::from_config(&config.provider)?;

    if refresh {
        println!("Clearing stored plan documents...");
        documents.clear().await?;
    }

    let existing: HashSet<String> = if refresh {
        HashSet::new()
    } else {
        documents
            .get_all()
            .await?
            .into_iter()
            .map(|d| d.metadata.plan_name)
            .collect()
    };

    let (mut success, mut failed, mut skipped) = (0usize, 0usize, 0usize);

    for source in &config.ingest.sources {
        if existing.contains(&source.name) {
            println!("건너뜀 (이미 존재): {}", source.name);
            skipped += 1;
            continue;
        }

        println!("크롤링 중: {}...", source.name);
        match ingest_one(&crawler, &provider, &documents, &config, source).await {
            Ok(name) => {
                println!("  저장 완료: {name}");
                success += 1;
            }
            Err(e) => {
                warn!(plan = %source.name, error = %e, "Plan ingestion failed");
                println!("  실패: {e}");
                failed += 1;
            }
        }
    }

    println!("\n=== 크롤링 완료 ===");
    println!("건너뜀: {skipped}개");
    println!("성공: {success}개");
    println!("실패: {failed}개");

    Ok(())
}

async fn ingest_one(
    crawler: &FirecrawlClient,
    provider: &OpenAiChatProvider,
    documents: &ChromaStore,
    config: &AppConfig,
    source: &PlanSource,
) -> Result<String, Box<dyn std::error::Error>> {
    let markdown = crawler.scrape_markdown(&source.url).await?;
    let excerpt: String = markdown.chars().take(EXTRACTION_EXCERPT_CHARS).collect();

    let response = provider
        .complete(ChatRequest {
            model: config.provider.extraction_model.clone(),
            messages: vec![
                PromptMessage::system(EXTRACTION_PROMPT),
                PromptMessage::user(format!(
                    "요금제명: {}\n\n크롤링 내용:\n{excerpt}",
                    source.name
                )),
            ],
            temperature: 0.0,
            max_tokens: Some(EXTRACTION_MAX_TOKENS),
        })
        .await?;

    let fields: PlanFields = serde_json::from_str(strip_code_fences(&response.content))?;
    let name = fields.plan_name.clone();
    documents.upsert(fields.into_document()).await?;
    Ok(name)
}

/// Models often wrap the requested JSON in a markdown code fence.
fn strip_code_fences(content: &str) -> &str {
    let content = content.trim();
    if let Some((_, rest)) = content.split_once("```json") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if let Some((_, rest)) = content.split_once("```") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else {
        content
    }
}
