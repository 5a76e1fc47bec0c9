use crate::error::{PnlError, Result};
use crate::insights::{InsightOutcome, InsightReport};
use crate::llm::client::OpenAiClient;
use crate::llm::prompts::{build_insight_prompt, SYSTEM_PROMPT_ANALYST};
use crate::metrics::FinancialMetrics;
use crate::schema::FinancialReport;

pub struct LlmInsightGenerator {
    client: OpenAiClient,
    system_prompt: String,
}

impl LlmInsightGenerator {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            system_prompt: SYSTEM_PROMPT_ANALYST.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(OpenAiClient::from_env()?))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub async fn generate(
        &self,
        report: &FinancialReport,
        metrics: &FinancialMetrics,
    ) -> Result<InsightReport> {
        let schema = InsightReport::schema_as_json()?;
        let prompt = build_insight_prompt(report, metrics, &schema);

        let content = self.client.complete_json(&self.system_prompt, &prompt).await?;
        let mut parsed: InsightReport = serde_json::from_str(&content).map_err(|e| {
            PnlError::InsightGeneration(format!("Model response is not valid insight JSON: {}", e))
        })?;

        if parsed.summary.trim().is_empty() && parsed.insights.is_empty() {
            return Err(PnlError::InsightGeneration(
                "Model returned an empty analysis".to_string(),
            ));
        }
        parsed.generated_by = self.client.model().to_string();
        Ok(parsed)
    }
}

/// Never fails: any client, network or response problem becomes
/// [`InsightOutcome::Unavailable`].
pub async fn generate_llm_insights(
    generator: &LlmInsightGenerator,
    report: &FinancialReport,
    metrics: &FinancialMetrics,
) -> InsightOutcome {
    InsightOutcome::from_result(generator.client.model(), generator.generate(report, metrics).await)
}
