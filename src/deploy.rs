// src/deploy.rs
use crate::client::ChainClient;
use crate::error::DeployError;
use crate::plan::{Arg, DeploymentStep, Plan};
use crate::registry::Registry;
use ethers::abi::Token;
use ethers::types::Address;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Deploying,
    Deployed,
    Wiring,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub registry: Registry,
    pub log: Vec<String>,
}

/// Resolves a descriptor against the addresses deployed so far.
///
/// Literals pass through unchanged; amounts are expected in base units.
pub fn resolve_arg(arg: &Arg, registry: &Registry) -> Result<Token, UnresolvedArg> {
    match arg {
        Arg::Literal(value) => Ok(value.clone().into_token()),
        Arg::Ref(name) => registry
            .get(name)
            .map(Token::Address)
            .ok_or_else(|| UnresolvedArg(name.clone())),
    }
}

/// A reference that was not in the registry at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unresolved reference `{0}`")]
pub struct UnresolvedArg(pub String);

/// Executes a [`Plan`] one step at a time against a [`ChainClient`].
///
/// After a failure the partial registry and per-step states remain
/// available for diagnosis until the next run starts.
pub struct Orchestrator<'a, C> {
    client: &'a C,
    registry: Registry,
    log: Vec<String>,
    steps: Vec<(String, StepState)>,
    state: RunState,
    progress: Option<Box<dyn FnMut(&str) + 'a>>,
}

impl<'a, C: ChainClient> Orchestrator<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            registry: Registry::new(),
            log: Vec::new(),
            steps: Vec::new(),
            state: RunState::NotStarted,
            progress: None,
        }
    }

    /// Receives every log entry as soon as it is recorded, so progress is
    /// visible even when a later step fails.
    pub fn on_progress(mut self, sink: impl FnMut(&str) + 'a) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn step_states(&self) -> &[(String, StepState)] {
        &self.steps
    }

    pub fn step_state(&self, name: &str) -> Option<StepState> {
        self.steps.iter().find(|(step, _)| step == name).map(|(_, state)| *state)
    }

    /// Addresses deployed so far, including those of a failed run.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Runs every step in declared order, halting on the first failure.
    ///
    /// The plan is validated up front so that a broken reference never
    /// costs a transaction. Each call deploys fresh instances.
    pub async fn run(&mut self, plan: &Plan) -> Result<DeploymentResult, DeployError> {
        self.registry = Registry::new();
        self.log.clear();
        self.steps = plan
            .steps()
            .iter()
            .map(|step| (step.name.clone(), StepState::Pending))
            .collect();

        if let Err(err) = plan.validate() {
            error!(%err, "plan rejected before any transaction");
            self.state = RunState::Failed;
            return Err(err);
        }

        self.state = RunState::InProgress;
        info!(steps = plan.steps().len(), "deployment started");

        for step in plan.steps() {
            let span = info_span!("step", name = %step.name, contract = %step.contract);
            let outcome = match self.deploy_step(step).instrument(span.clone()).await {
                Ok(_) => self.run_post_deploy_actions(step, plan).instrument(span).await,
                Err(err) => Err(err),
            };

            if let Err(err) = outcome {
                self.set_step_state(&step.name, StepState::Failed);
                self.state = RunState::Failed;
                error!(%err, deployed = self.registry.len(), "deployment halted");
                return Err(err);
            }
            self.set_step_state(&step.name, StepState::Complete);
        }

        self.state = RunState::Completed;
        info!("deployment completed");
        Ok(DeploymentResult {
            registry: self.registry.clone(),
            log: self.log.clone(),
        })
    }

    /// Deploys one step and records its address.
    pub async fn deploy_step(&mut self, step: &DeploymentStep) -> Result<Address, DeployError> {
        let args = self.resolve_all(step, &step.constructor_args)?;

        self.set_step_state(&step.name, StepState::Deploying);
        let address = self
            .client
            .deploy(&step.contract, args)
            .await
            .map_err(|cause| DeployError::DeploymentFailed {
                step: step.name.clone(),
                cause,
            })?;

        self.registry.insert(step.name.clone(), address);
        self.set_step_state(&step.name, StepState::Deployed);
        self.record(format!("Deployed {}: {address:?}", step.name));
        Ok(address)
    }

    /// Issues the step's wiring calls in order; applied calls are never undone.
    pub async fn run_post_deploy_actions(&mut self, step: &DeploymentStep, plan: &Plan) -> Result<(), DeployError> {
        if step.post_deploy_actions.is_empty() {
            return Ok(());
        }
        self.set_step_state(&step.name, StepState::Wiring);

        for action in &step.post_deploy_actions {
            let target = action.target_for(&step.name);
            let label = action.label(&step.name);
            let at = self.registry.get(target).ok_or_else(|| DeployError::UnresolvedReference {
                step: step.name.clone(),
                reference: target.to_string(),
            })?;
            let contract = plan.contract_of(target).unwrap_or(step.contract.as_str());
            let args = self.resolve_all(step, &action.args)?;

            self.client
                .transact(contract, at, &action.method, args)
                .await
                .map_err(|cause| DeployError::WiringFailed {
                    step: step.name.clone(),
                    action: label.clone(),
                    cause,
                })?;

            let rendered: Vec<String> = action.args.iter().map(ToString::to_string).collect();
            self.record(format!("Wired {label}({}) for {}", rendered.join(", "), step.name));
        }

        Ok(())
    }

    fn resolve_all(&self, step: &DeploymentStep, args: &[Arg]) -> Result<Vec<Token>, DeployError> {
        args.iter()
            .map(|arg| resolve_arg(arg, &self.registry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|UnresolvedArg(reference)| DeployError::UnresolvedReference {
                step: step.name.clone(),
                reference,
            })
    }

    fn record(&mut self, entry: String) {
        info!("{entry}");
        if let Some(sink) = self.progress.as_mut() {
            sink(&entry);
        }
        self.log.push(entry);
    }

    fn set_step_state(&mut self, name: &str, state: StepState) {
        match self.steps.iter_mut().find(|(step, _)| step == name) {
            Some(slot) => slot.1 = state,
            None => self.steps.push((name.to_string(), state)),
        }
    }
}

/// Runs `plan` with a fresh [`Orchestrator`].
pub async fn run<C: ChainClient>(client: &C, plan: &Plan) -> Result<DeploymentResult, DeployError> {
    Orchestrator::new(client).run(plan).await
}
