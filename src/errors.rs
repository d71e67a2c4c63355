use thiserror::Error;

/// Error type for mating operations.
///
/// The variants map onto the stages at which a mating cycle can fail: bad
/// configuration is caught at construction, incompatibilities before the
/// cycle starts, infeasibility during the cycle, and callback failures
/// whenever user code runs. No variant is ever produced after a commit; a
/// failed cycle leaves the parental generation untouched.
#[derive(Debug, Error)]
pub enum MatingError {
    /// Invalid scheme configuration, raised at construction.
    #[error("Invalid mating configuration: {0}")]
    Config(String),

    /// The scheme requires a capability the population lacks.
    #[error("Incompatible population: {0}")]
    Incompatible(String),

    /// The cycle could not be completed; nothing was committed.
    #[error("Mating infeasible: {0}")]
    Infeasible(String),

    /// A user callback failed or returned malformed data.
    #[error("Callback error: {0}")]
    Callback(String),

    /// A subpopulation size expression could not be evaluated.
    #[error("Size expression error: {0}")]
    Expression(String),
}
