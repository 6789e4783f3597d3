use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    FetchOnly,
    AnalyzeOnly,
    IntegrateOnly,
    AttributionOnly,
}

impl RunMode {
    pub fn runs_fetch(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::FetchOnly)
    }

    pub fn runs_analysis(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::AnalyzeOnly)
    }

    pub fn runs_integration(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::IntegrateOnly)
    }

    pub fn runs_attribution(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::AttributionOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Keywords,
    Sentiment,
    Aggregation,
    Events,
    Correlation,
    Integration,
    Attribution,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Keywords => "keywords",
            Stage::Sentiment => "sentiment",
            Stage::Aggregation => "aggregation",
            Stage::Events => "events",
            Stage::Correlation => "correlation",
            Stage::Integration => "integration",
            Stage::Attribution => "attribution",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageSummary {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            processed: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub stages: Vec<StageSummary>,
}

impl RunSummary {
    pub fn push(&mut self, summary: StageSummary) {
        self.stages.push(summary);
    }

    pub fn total_failed(&self) -> usize {
        self.stages.iter().map(|s| s.failed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_stage_flags() {
        assert!(RunMode::Full.runs_fetch() && RunMode::Full.runs_attribution());
        assert!(RunMode::FetchOnly.runs_fetch());
        assert!(!RunMode::FetchOnly.runs_analysis());
        assert!(!RunMode::AttributionOnly.runs_integration());
        assert!(RunMode::IntegrateOnly.runs_integration());
    }
}
