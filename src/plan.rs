// src/plan.rs
use crate::error::DeployError;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::collections::HashSet;
use std::fmt;

/// A literal constructor or call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl Value {
    pub fn into_token(self) -> Token {
        match self {
            Value::Address(address) => Token::Address(address),
            Value::Uint(value) => Token::Uint(value),
            Value::Bool(value) => Token::Bool(value),
            Value::String(value) => Token::String(value),
        }
    }
}

/// An argument descriptor: either a literal or the address of a named step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Literal(Value),
    Ref(String),
}

impl Arg {
    pub fn reference(step: impl Into<String>) -> Self {
        Arg::Ref(step.into())
    }

    pub fn address(address: Address) -> Self {
        Arg::Literal(Value::Address(address))
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Ref(step) => write!(f, "{step}"),
            Arg::Literal(Value::Address(address)) => write!(f, "{address:?}"),
            Arg::Literal(Value::Uint(value)) => write!(f, "{value}"),
            Arg::Literal(Value::Bool(value)) => write!(f, "{value}"),
            Arg::Literal(Value::String(value)) => write!(f, "{value:?}"),
        }
    }
}

/// A configuration call issued once its owning step has been deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Step whose instance receives the call; `None` targets the owning step.
    pub target: Option<String>,
    pub method: String,
    pub args: Vec<Arg>,
}

impl Action {
    /// A call on the freshly deployed instance itself.
    pub fn call(method: impl Into<String>) -> Self {
        Self {
            target: None,
            method: method.into(),
            args: Vec::new(),
        }
    }

    /// A call on an instance deployed by an earlier step.
    pub fn on(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            method: method.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn target_for<'a>(&'a self, owner: &'a str) -> &'a str {
        self.target.as_deref().unwrap_or(owner)
    }

    /// `Target.method` label used in logs and errors.
    pub fn label(&self, owner: &str) -> String {
        format!("{}.{}", self.target_for(owner), self.method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStep {
    pub name: String,
    /// Compiled artifact name handed to the contract factory.
    pub contract: String,
    pub constructor_args: Vec<Arg>,
    pub post_deploy_actions: Vec<Action>,
}

impl DeploymentStep {
    pub fn new(name: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            constructor_args: Vec::new(),
            post_deploy_actions: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.constructor_args.push(arg);
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.post_deploy_actions.push(action);
        self
    }
}

/// Ordered list of steps; declaration order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<DeploymentStep>,
}

impl Plan {
    pub fn step(mut self, step: DeploymentStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn find(&self, name: &str) -> Option<&DeploymentStep> {
        self.steps.iter().find(|step| step.name == name)
    }

    /// Artifact name of the contract deployed by step `name`.
    pub fn contract_of(&self, name: &str) -> Option<&str> {
        self.find(name).map(|step| step.contract.as_str())
    }

    /// Checks that names are unique and that every reference points backwards.
    ///
    /// Constructor arguments may only reference earlier steps. Actions may
    /// additionally reference the step that owns them.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut declared: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            for arg in &step.constructor_args {
                if let Arg::Ref(reference) = arg {
                    if !declared.contains(reference.as_str()) {
                        return Err(unresolved(step, reference));
                    }
                }
            }

            if !declared.insert(step.name.as_str()) {
                return Err(DeployError::DuplicateStep {
                    name: step.name.clone(),
                });
            }

            for action in &step.post_deploy_actions {
                let refs = action.target.iter().chain(action.args.iter().filter_map(|arg| match arg {
                    Arg::Ref(reference) => Some(reference),
                    Arg::Literal(_) => None,
                }));
                for reference in refs {
                    if !declared.contains(reference.as_str()) {
                        return Err(unresolved(step, reference));
                    }
                }
            }
        }

        Ok(())
    }
}

fn unresolved(step: &DeploymentStep, reference: &str) -> DeployError {
    DeployError::UnresolvedReference {
        step: step.name.clone(),
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dai() -> Address {
        Address::from_low_u64_be(0xda1)
    }

    #[test]
    fn backward_references_validate() {
        let plan = Plan::default()
            .step(DeploymentStep::new("Token", "COD"))
            .step(
                DeploymentStep::new("Treasury", "Treasury")
                    .arg(Arg::reference("Token"))
                    .arg(Arg::address(dai()))
                    .then(Action::on("Token", "setTreasury").arg(Arg::reference("Treasury"))),
            );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn forward_constructor_reference_is_rejected() {
        let plan = Plan::default()
            .step(DeploymentStep::new("Treasury", "Treasury").arg(Arg::reference("Token")))
            .step(DeploymentStep::new("Token", "COD"));

        match plan.validate() {
            Err(DeployError::UnresolvedReference { step, reference }) => {
                assert_eq!(step, "Treasury");
                assert_eq!(reference, "Token");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn constructor_cannot_reference_itself() {
        let plan = Plan::default().step(DeploymentStep::new("Vault", "Vault").arg(Arg::reference("Vault")));
        assert!(matches!(
            plan.validate(),
            Err(DeployError::UnresolvedReference { reference, .. }) if reference == "Vault"
        ));
    }

    #[test]
    fn action_may_reference_its_own_step() {
        let plan = Plan::default()
            .step(DeploymentStep::new("Token", "COD"))
            .step(DeploymentStep::new("Vault", "Vault").then(Action::on("Token", "setVault").arg(Arg::reference("Vault"))));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn action_target_must_be_declared() {
        let plan = Plan::default().step(DeploymentStep::new("Vault", "Vault").then(Action::on("sCOD", "setVault")));
        assert!(matches!(
            plan.validate(),
            Err(DeployError::UnresolvedReference { reference, .. }) if reference == "sCOD"
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let plan = Plan::default()
            .step(DeploymentStep::new("Cod", "COD"))
            .step(DeploymentStep::new("Cod", "COD"));
        assert!(matches!(plan.validate(), Err(DeployError::DuplicateStep { name }) if name == "Cod"));
    }

    #[test]
    fn action_label_defaults_to_owner() {
        let action = Action::call("initialize");
        assert_eq!(action.label("Vault"), "Vault.initialize");
        assert_eq!(Action::on("Cod", "setTreasury").label("Treasury"), "Cod.setTreasury");
    }
}
