// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// Only two failure classes cross a collaborator boundary:
//
//   SourceUnavailable — a price / balance / fee fetch failed. Recovered
//                       locally: the current tick's remaining steps are
//                       skipped and the next block starts fresh.
//   ExecutionFailed   — order submission or confirmation failed. No trade
//                       record is written; cooldown and rate-limit counters
//                       do not advance.
//
// Arithmetic edge cases never surface as errors; they degrade to neutral
// sentinel values inside the indicator and signal code.
// =============================================================================

/// Failure returned by an external collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A price, balance, or fee source could not be reached.
    SourceUnavailable(String),
    /// The order executor rejected or failed to confirm an instruction.
    ExecutionFailed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable(detail) => write!(f, "source unavailable: {detail}"),
            Self::ExecutionFailed(reason) => write!(f, "execution failed: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let e = EngineError::SourceUnavailable("rpc timeout".into());
        assert_eq!(e.to_string(), "source unavailable: rpc timeout");
        let e = EngineError::ExecutionFailed("slippage exceeded".into());
        assert_eq!(e.to_string(), "execution failed: slippage exceeded");
    }
}
