use crate::{Policy, PolicyBuilder, Result, Value};

/// A policy module: per-actor rules plus the options shared by every policy
/// it builds.
pub trait PolicyModule {
    type Actor: ?Sized;

    fn name(&self) -> &str;

    /// Options validated into each new policy's configuration.
    fn options(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Adds the actor's rules to an empty policy.
    fn build(&self, policy: Policy, actor: &Self::Actor) -> Policy;
}

/// Builds the policy of `actor`.
///
/// Fails if the module declares an unrecognized or mistyped option.
pub fn policy_for<M>(module: &M, actor: &M::Actor) -> Result<Policy>
where
    M: PolicyModule + ?Sized,
{
    let policy = PolicyBuilder::new(module.name())
        .with_options(module.options())
        .build()?;
    Ok(module.build(policy, actor))
}
