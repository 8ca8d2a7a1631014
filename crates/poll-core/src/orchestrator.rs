//! Simulation orchestrator.
//!
//! Drives one request end to end: resolve the model, select agents, load
//! personas, query each one, aggregate, and assemble the report.

use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;

use poll_events::{
    generate_run_id, AgentResponse, Diagnostic, DialogueTurn, QueryResult, QuestionSet, Report,
    Stage, Summary, SurveyRequest,
};
use tally::{AggregationError, ResponseAggregator};

use crate::config::{LlmConfig, PollConfig};
use crate::error::RunError;
use crate::gateway::GenerationGateway;
use crate::llm::{HttpModelProvider, ModelProvider};
use crate::persona::{FsPersonaStore, PersonaAgent, PersonaStore};
use crate::population::{Population, PopulationSampler};
use crate::prompt::PromptLibrary;
use crate::protocol::{AgentOutcome, Query, QueryError, QueryProtocol};

/// Runs survey requests against a persona store and a model provider.
pub struct SimulationOrchestrator {
    config: PollConfig,
    store: Arc<dyn PersonaStore>,
    models: Arc<dyn ModelProvider>,
    prompts: PromptLibrary,
    sampler: PopulationSampler,
    aggregator: ResponseAggregator,
    pool: Option<rayon::ThreadPool>,
}

impl SimulationOrchestrator {
    /// Creates an orchestrator. A worker pool is built when
    /// `run.workers > 1`.
    pub fn new(
        config: PollConfig,
        store: Arc<dyn PersonaStore>,
        models: Arc<dyn ModelProvider>,
    ) -> Result<Self, RunError> {
        config.validate()?;

        let pool = if config.run.workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.run.workers)
                    .thread_name(|i| format!("genpoll-worker-{}", i))
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self {
            sampler: PopulationSampler::new(config.population.baseline_id.clone()),
            config,
            store,
            models,
            prompts: PromptLibrary::builtin(),
            aggregator: ResponseAggregator::new(),
            pool,
        })
    }

    /// Orchestrator over the agent bank on disk and HTTP models, with
    /// prompt overrides from `prompts.dir` when set.
    pub fn from_config(config: PollConfig) -> Result<Self, RunError> {
        let store = Arc::new(FsPersonaStore::new(&config.population));
        let prompts = match &config.prompts.dir {
            Some(dir) => PromptLibrary::from_dir(dir)?,
            None => PromptLibrary::builtin(),
        };
        Ok(Self::new(config, store, Arc::new(HttpModelProvider))?.with_prompts(prompts))
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// The population under the configured root.
    pub fn population(&self) -> Population {
        Population::discover(&self.config.population.root)
    }

    /// Runs one request.
    ///
    /// The model configuration is resolved before any agent is touched, so
    /// an unknown `llm_config_name` fails without a model call.
    pub fn run<R: Rng + ?Sized>(
        &self,
        request: &SurveyRequest,
        rng: &mut R,
    ) -> Result<Report, RunError> {
        let llm = self.config.llm(request.llm_config_name.as_deref())?;
        let protocol = self.protocol(llm)?;

        let population = if request.agent_count.is_baseline() {
            Population::from_members(&self.config.population.root, Vec::<String>::new())
        } else {
            self.population()
        };
        let selection = self.sampler.select(&population, &request.agent_count, rng)?;

        let run_id = generate_run_id();
        let command = request.command.kind();
        tracing::info!(
            run_id = %run_id,
            %command,
            llm = %llm.config_name,
            agents = selection.len(),
            "starting run"
        );

        let mut diagnostics = Vec::new();
        let mut agents = Vec::with_capacity(selection.len());
        for agent_id in &selection.agent_ids {
            match self.store.load(agent_id) {
                Ok(agent) => agents.push(agent),
                Err(e) => diagnostics.push(Diagnostic::new(agent_id, Stage::Load, e.to_string())),
            }
        }

        let query = Query::from_command(&request.command);
        let mut responses = Vec::with_capacity(agents.len());
        for outcome in self.query_all(&protocol, &agents, &query) {
            match outcome {
                AgentOutcome::Answered(response) => {
                    tracing::debug!(agent_id = response.agent_id(), "agent answered");
                    responses.push(response);
                }
                AgentOutcome::NoAnswer { agent_id, error } => {
                    diagnostics.extend(query_diagnostics(&agent_id, &error, query.questions()));
                }
            }
        }

        let summary = match query.questions() {
            Some(questions) => {
                let results: Vec<QueryResult> =
                    responses.iter().filter_map(AgentResponse::as_survey).cloned().collect();
                let tally = self.aggregator.aggregate(questions, &results);
                diagnostics.extend(tally.rejections.iter().map(aggregation_diagnostic));
                tally.summary
            }
            None => Summary::new(),
        };

        for diagnostic in &diagnostics {
            tracing::warn!(
                agent_id = %diagnostic.agent_id,
                question = diagnostic.question.as_deref().unwrap_or(""),
                stage = %diagnostic.stage,
                "{}",
                diagnostic.message
            );
        }

        let num_agents = responses.len();
        tracing::info!(
            run_id = %run_id,
            answered = num_agents,
            diagnostics = diagnostics.len(),
            "run complete"
        );

        Ok(Report {
            run_id,
            command,
            individual_responses: responses,
            summary,
            num_agents,
            diagnostics,
        })
    }

    /// Asks one agent for its next turn in a conversation.
    pub fn converse(
        &self,
        agent_id: &str,
        llm_config_name: Option<&str>,
        dialogue: &[DialogueTurn],
        context: &str,
    ) -> Result<AgentOutcome, RunError> {
        let llm = self.config.llm(llm_config_name)?;
        let protocol = self.protocol(llm)?;
        let agent = self.store.load(agent_id)?;

        let outcome = protocol.answer(&agent, &Query::Utterance { dialogue, context });
        if let AgentOutcome::NoAnswer { error, .. } = &outcome {
            tracing::warn!(agent_id, stage = %error.stage(), "{}", error);
        }
        Ok(outcome)
    }

    /// Full name of a stored persona.
    pub fn agent_name(&self, agent_id: &str) -> Result<String, RunError> {
        Ok(self.store.load(agent_id)?.full_name().to_string())
    }

    /// Root of the configured population.
    pub fn population_root(&self) -> &Path {
        &self.config.population.root
    }

    fn protocol(&self, llm: &LlmConfig) -> Result<QueryProtocol, RunError> {
        let model = self.models.model_for(llm)?;
        let gateway = GenerationGateway::new(model, self.prompts.clone());
        Ok(QueryProtocol::new(gateway)
            .with_retrieval_limit(self.config.run.retrieval_limit)
            .with_max_attempts(self.config.run.max_attempts))
    }

    // Outcomes come back in `agents` order whether or not the pool is used.
    fn query_all(
        &self,
        protocol: &QueryProtocol,
        agents: &[PersonaAgent],
        query: &Query<'_>,
    ) -> Vec<AgentOutcome> {
        match &self.pool {
            Some(pool) if agents.len() > 1 => pool.install(|| {
                agents
                    .par_iter()
                    .map(|agent| protocol.answer(agent, query))
                    .collect::<Vec<_>>()
            }),
            _ => agents
                .iter()
                .map(|agent| protocol.answer(agent, query))
                .collect(),
        }
    }
}

/// One diagnostic per question of the batch, or one for the agent when
/// the query has no questions.
fn query_diagnostics(
    agent_id: &str,
    error: &QueryError,
    questions: Option<&QuestionSet>,
) -> Vec<Diagnostic> {
    let stage = error.stage();
    let message = error.to_string();
    match questions {
        Some(questions) => questions
            .texts()
            .map(|q| Diagnostic::new(agent_id, stage, message.clone()).with_question(q))
            .collect(),
        None => vec![Diagnostic::new(agent_id, stage, message)],
    }
}

fn aggregation_diagnostic(rejection: &AggregationError) -> Diagnostic {
    let diagnostic = Diagnostic::new(rejection.agent_id(), Stage::Aggregation, rejection.to_string());
    match rejection.question() {
        Some(question) => diagnostic.with_question(question),
        None => diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::fakes::{FixedModelProvider, MemoryPersonaStore, ScriptedModel};
    use poll_events::{fixtures, Command, SelectionRequest};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn baseline_store() -> MemoryPersonaStore {
        MemoryPersonaStore::new().with_agent(crate::BASELINE_AGENT_ID, "Baseline Person", "age: 50")
    }

    fn orchestrator(
        store: MemoryPersonaStore,
        model: Arc<ScriptedModel>,
    ) -> (SimulationOrchestrator, Arc<FixedModelProvider>) {
        let provider = Arc::new(FixedModelProvider::new(model));
        let orchestrator =
            SimulationOrchestrator::new(PollConfig::default(), Arc::new(store), provider.clone())
                .unwrap();
        (orchestrator, provider)
    }

    #[test]
    fn test_baseline_run() {
        let model = Arc::new(ScriptedModel::new([r#"{"responses": ["Yes"], "reasonings": ["why not"]}"#]));
        let (orchestrator, provider) = orchestrator(baseline_store(), model.clone());

        let request = SurveyRequest::new(
            Command::Categorical {
                questions: fixtures::yes_no_questions(),
            },
            SelectionRequest::Count(1),
        )
        .with_llm("model_2");

        let report = orchestrator
            .run(&request, &mut SmallRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(report.num_agents, 1);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.individual_responses[0].agent_id(), crate::BASELINE_AGENT_ID);
        let q1 = report.summary.get("Q1").unwrap();
        assert_eq!(q1.count("Yes"), Some(1));
        assert_eq!(q1.count("No"), Some(0));
        assert_eq!(q1.explanations, vec!["why not"]);
        assert_eq!(provider.requested(), vec!["model_2"]);
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_unknown_llm_fails_before_any_call() {
        let model = Arc::new(ScriptedModel::new(["unused"]));
        let (orchestrator, provider) = orchestrator(baseline_store(), model.clone());

        let request = fixtures::sample_request().with_llm("model_9");
        let err = orchestrator
            .run(&request, &mut SmallRng::seed_from_u64(1))
            .unwrap_err();

        assert!(matches!(err, RunError::Config(ConfigError::UnknownLlm(_))));
        assert!(provider.requested().is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_missing_persona_is_a_load_diagnostic() {
        let model = Arc::new(ScriptedModel::new(["unused"]));
        let (orchestrator, _) = orchestrator(MemoryPersonaStore::new(), model.clone());

        let request = SurveyRequest::new(
            Command::Categorical {
                questions: fixtures::yes_no_questions(),
            },
            SelectionRequest::Count(1),
        );
        let report = orchestrator
            .run(&request, &mut SmallRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(report.num_agents, 0);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].stage, Stage::Load);
        assert_eq!(report.summary.get("Q1").unwrap().total, 0);
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_parse_failure_yields_one_diagnostic_per_question() {
        let model = Arc::new(ScriptedModel::new(["no json here"]));
        let (orchestrator, _) = orchestrator(baseline_store(), model);

        let questions =
            QuestionSet::categorical([("Q1", ["Yes", "No"]), ("Q2", ["A", "B"])]).unwrap();
        let request = SurveyRequest::new(Command::Categorical { questions }, SelectionRequest::Count(1));
        let report = orchestrator
            .run(&request, &mut SmallRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(report.num_agents, 0);
        let questions: Vec<_> = report
            .diagnostics
            .iter()
            .map(|d| (d.stage, d.question.as_deref()))
            .collect();
        assert_eq!(questions, vec![(Stage::Parse, Some("Q1")), (Stage::Parse, Some("Q2"))]);
    }

    #[test]
    fn test_converse_returns_utterance() {
        let model = Arc::new(ScriptedModel::new([r#"{"utterance": "Hello there."}"#]));
        let (orchestrator, _) = orchestrator(baseline_store(), model);

        let dialogue = vec![DialogueTurn::new("Interviewer", "Hi!")];
        let outcome = orchestrator
            .converse(crate::BASELINE_AGENT_ID, None, &dialogue, "")
            .unwrap();

        match outcome {
            AgentOutcome::Answered(AgentResponse::Utterance(u)) => assert_eq!(u.utterance, "Hello there."),
            other => panic!("expected an utterance, got {:?}", other),
        }
    }

    #[test]
    fn test_converse_with_unknown_agent() {
        let model = Arc::new(ScriptedModel::new(["unused"]));
        let (orchestrator, _) = orchestrator(baseline_store(), model);

        let err = orchestrator.converse("ghost", None, &[], "").unwrap_err();
        assert!(matches!(err, RunError::AgentLoad(_)));
    }
}
