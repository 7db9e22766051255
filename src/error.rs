// src/error.rs

/// Errors raised while validating or executing a deployment plan.
///
/// Every variant is fatal to the run. Chain failures keep the underlying
/// `anyhow::Error` so the full cause chain reaches the operator.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("step `{step}` references `{reference}`, which is not deployed before it")]
    UnresolvedReference { step: String, reference: String },

    #[error("step name `{name}` is declared more than once")]
    DuplicateStep { name: String },

    #[error("deployment of `{step}` failed: {cause:#}")]
    DeploymentFailed { step: String, cause: anyhow::Error },

    #[error("wiring `{action}` for `{step}` failed: {cause:#}")]
    WiringFailed {
        step: String,
        action: String,
        cause: anyhow::Error,
    },

    #[error("initial supply distribution of `{token}` failed: {cause:#}")]
    DistributionFailed { token: String, cause: anyhow::Error },
}
