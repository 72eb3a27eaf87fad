/// Classification for retry policy.
///
/// Used by the call wrapper and the source aggregator to decide how to
/// respond to a failure without matching on every error variant.
///
/// # Behavior Summary
///
/// | Class | Retry Same Provider? | Delay |
/// |-------|---------------------|-------|
/// | `Never` | No | - |
/// | `Wait` | Yes, once the window resets | the denial's wait time |
/// | `Cooldown` | Yes | fixed 60 s |
/// | `Backoff` | Yes | exponential, capped |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - the request is fundamentally invalid or every option
    /// has already been exhausted.
    Never,

    /// The local quota denied the call. Retrying is pointless until the
    /// binding window resets; sleep the advertised wait time first.
    Wait,

    /// The provider itself rate limited us (HTTP 429 or equivalent).
    ///
    /// Distinct from a local quota denial: the provider's own limiter has
    /// tripped, so a fixed cooldown is applied before the next attempt
    /// regardless of what the local counters say.
    Cooldown,

    /// Transient failure (network, timeout, provider-side error).
    /// Retry with exponential backoff up to a bounded attempt count,
    /// then treat the provider as failed for this request.
    Backoff,
}
