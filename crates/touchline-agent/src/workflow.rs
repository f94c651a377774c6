use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use touchline_core::config::{WebSearchConfig, WorkflowConfig};
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::{
    AnswerGenerator, Classifier, DomainDataProvider, LookupPlanner, WebSearchProvider,
};

use crate::graph::{Edge, SharedState, WorkflowExecutor, WorkflowGraph};
use crate::steps::{DomainDataStep, ResponderStep, RouteTargets, RouterStep, WebSearchStep};

/// Step ids of the question workflow.
pub mod ids {
    pub const SUPERVISOR: &str = "supervisor";
    pub const WEB_SEARCH: &str = "web_search";
    pub const DOMAIN_DATA: &str = "domain_data";
    pub const RESPONDER: &str = "responder";
}

/// External services the question workflow depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub web_search: Arc<dyn WebSearchProvider>,
    pub domain_data: Arc<dyn DomainDataProvider>,
    pub planner: Arc<dyn LookupPlanner>,
    pub generator: Arc<dyn AnswerGenerator>,
}

/// The football question-answering graph:
///
/// ```text
/// supervisor ─┬─> responder
///             ├─> web_search ──> responder
///             ├─> domain_data ─> responder
///             └─> {web_search, domain_data} ═> responder
/// ```
pub struct QuestionWorkflow {
    collaborators: Collaborators,
    query_prefix: String,
    not_relevant_answer: Option<String>,
}

impl QuestionWorkflow {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            query_prefix: String::new(),
            not_relevant_answer: None,
        }
    }

    /// Apply the search prefix and the out-of-scope answer from config.
    pub fn configured(
        collaborators: Collaborators,
        search: &WebSearchConfig,
        workflow: &WorkflowConfig,
    ) -> Self {
        Self::new(collaborators)
            .with_query_prefix(search.query_prefix.clone())
            .with_not_relevant_answer(workflow.not_relevant_answer.clone())
    }

    pub fn with_query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = prefix.into();
        self
    }

    pub fn with_not_relevant_answer(mut self, answer: impl Into<String>) -> Self {
        self.not_relevant_answer = Some(answer.into());
        self
    }

    pub fn build(self) -> Result<WorkflowGraph> {
        let c = self.collaborators;
        let targets = RouteTargets {
            web_search: ids::WEB_SEARCH.into(),
            domain_data: ids::DOMAIN_DATA.into(),
            responder: ids::RESPONDER.into(),
        };

        let mut responder = ResponderStep::new(c.generator);
        if let Some(answer) = self.not_relevant_answer {
            responder = responder.with_not_relevant_answer(answer);
        }

        WorkflowGraph::builder()
            .step(ids::SUPERVISOR, Arc::new(RouterStep::new(c.classifier, targets)))
            .step(
                ids::WEB_SEARCH,
                Arc::new(
                    WebSearchStep::new(c.web_search, ids::RESPONDER)
                        .with_query_prefix(self.query_prefix),
                ),
            )
            .step(
                ids::DOMAIN_DATA,
                Arc::new(DomainDataStep::new(c.domain_data, c.planner, ids::RESPONDER)),
            )
            .step(ids::RESPONDER, Arc::new(responder))
            .entry(ids::SUPERVISOR)
            .terminal(ids::RESPONDER)
            .edge(Edge::goto(ids::SUPERVISOR, ids::RESPONDER))
            .edge(Edge::goto(ids::SUPERVISOR, ids::WEB_SEARCH))
            .edge(Edge::goto(ids::SUPERVISOR, ids::DOMAIN_DATA))
            .edge(Edge::fan_out(
                ids::SUPERVISOR,
                [ids::WEB_SEARCH, ids::DOMAIN_DATA],
                ids::RESPONDER,
            ))
            .edge(Edge::goto(ids::WEB_SEARCH, ids::RESPONDER))
            .edge(Edge::goto(ids::DOMAIN_DATA, ids::RESPONDER))
            .build()
    }

    pub fn executor(self) -> Result<WorkflowExecutor> {
        Ok(WorkflowExecutor::new(self.build()?))
    }
}

/// Run one question through `executor` and return the answer text.
pub async fn answer_question(
    executor: &WorkflowExecutor,
    question: &str,
    cancel: CancellationToken,
) -> Result<String> {
    let state = executor.run(SharedState::new(question), cancel).await?;
    state
        .final_answer()
        .map(str::to_string)
        .ok_or_else(|| TouchlineError::InvariantViolation("run halted without an answer".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchline_test_utils::{
        sample_teams, FixedPlanner, MockDomainData, MockGenerator, MockSearch, ScriptedClassifier,
    };

    fn collaborators(token: &str) -> Collaborators {
        Collaborators {
            classifier: Arc::new(ScriptedClassifier::returning(token)),
            web_search: Arc::new(MockSearch::returning(serde_json::json!({"results": []}))),
            domain_data: Arc::new(MockDomainData::with_teams(sample_teams())),
            planner: Arc::new(FixedPlanner::by_name("Arsenal")),
            generator: Arc::new(MockGenerator::new()),
        }
    }

    #[test]
    fn test_graph_shape() {
        let graph = QuestionWorkflow::new(collaborators("both")).build().unwrap();
        assert_eq!(graph.entry().as_str(), ids::SUPERVISOR);
        assert!(graph.is_terminal(&ids::RESPONDER.into()));
        assert_eq!(graph.step_ids().len(), 4);
        assert_eq!(graph.edges().len(), 6);
    }

    #[tokio::test]
    async fn test_answer_question_returns_text() {
        let executor = QuestionWorkflow::new(collaborators("stats"))
            .executor()
            .unwrap();
        let answer = answer_question(&executor, "Where does Arsenal play?", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, MockGenerator::answer_for("Where does Arsenal play?", 1));
    }

    #[tokio::test]
    async fn test_configured_uses_not_relevant_answer() {
        let search = WebSearchConfig {
            provider: "tavily".into(),
            api_key: "tvly-test".into(),
            topic: "general".into(),
            query_prefix: "football soccer".into(),
            max_results: 5,
        };
        let workflow = WorkflowConfig {
            not_relevant_answer: "Only football, sorry.".into(),
            ..WorkflowConfig::default()
        };
        let executor = QuestionWorkflow::configured(collaborators("conversation"), &search, &workflow)
            .executor()
            .unwrap();
        let answer = answer_question(&executor, "hello", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "Only football, sorry.");
    }
}
