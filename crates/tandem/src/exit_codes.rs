//! Exit codes for the CLI

use tandem_core::error::TandemError;

/// Success
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Git or working tree error
pub const GIT_ERROR: i32 = 3;

/// Registry error
pub const REGISTRY_ERROR: i32 = 4;

/// Validation error
pub const VALIDATION_ERROR: i32 = 5;

/// Dependency cycle rejected
pub const CYCLE_ERROR: i32 = 6;

/// Some packages were published, others failed
pub const PARTIAL_PUBLISH: i32 = 7;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// Exit code for a failed command
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<TandemError>()
        .map(for_tandem_error)
        .unwrap_or(ERROR)
}

fn for_tandem_error(err: &TandemError) -> i32 {
    match err {
        TandemError::Config(_) => CONFIG_ERROR,
        TandemError::Git(_) | TandemError::WorkingTree(_) => GIT_ERROR,
        TandemError::Validation(_) => VALIDATION_ERROR,
        TandemError::Cycle(_) => CYCLE_ERROR,
        TandemError::PartialPublish(_) => PARTIAL_PUBLISH,
        TandemError::Registry(_) => REGISTRY_ERROR,
        TandemError::Prompt(_) => CANCELLED,
        _ => ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::error::{CycleError, PartialPublishError, ValidationError, WorkingTreeError};

    fn code(err: impl Into<TandemError>) -> i32 {
        for_error(&anyhow::Error::from(err.into()))
    }

    #[test]
    fn test_typed_failures_map_to_codes() {
        assert_eq!(code(ValidationError::UnknownPackage("x".into())), VALIDATION_ERROR);
        assert_eq!(code(WorkingTreeError::UncommittedChanges), GIT_ERROR);
        assert_eq!(code(CycleError { members: vec!["a".into()] }), CYCLE_ERROR);
        assert_eq!(
            code(PartialPublishError {
                stage: "publish".into(),
                succeeded: vec![],
                failed: vec![],
                skipped: vec![],
            }),
            PARTIAL_PUBLISH
        );
        assert_eq!(code(TandemError::Prompt("interrupted".into())), CANCELLED);
    }

    #[test]
    fn test_untyped_error_is_general() {
        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
    }
}
