use std::sync::Arc;

use anyhow::Result;
use data_model::{body::listed_function_names, process_body, split_function_name};
use faas_client::{FaasController, UpstreamResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What a namespace deletion reports when some of its functions could not be
/// deleted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// Acknowledge the deletion regardless of individual failures.
    #[default]
    ReportSuccess,
    /// Fail the deletion when any function could not be deleted.
    ReportFailure,
}

impl PartialFailurePolicy {
    pub fn is_failure(&self, outcome: &DeleteOutcome) -> bool {
        match self {
            PartialFailurePolicy::ReportSuccess => false,
            PartialFailurePolicy::ReportFailure => !outcome.failed.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub attempted: usize,
    /// Composite names of the functions whose deletion failed.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceDeletion {
    /// Listing the functions failed; nothing was deleted.
    ListFailed(UpstreamResponse),
    Completed(DeleteOutcome),
}

/// Deletes every function of a namespace, one at a time, in the order the
/// controller lists them.
pub struct BulkNamespaceDeleter {
    controller: Arc<dyn FaasController>,
}

impl BulkNamespaceDeleter {
    pub fn new(controller: Arc<dyn FaasController>) -> Self {
        Self { controller }
    }

    /// Fails only when the listing call cannot be made at all. Individual
    /// delete failures are collected in the outcome.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<NamespaceDeletion> {
        let listing = self.controller.list_functions().await?;
        if !listing.is_success() {
            warn!(
                namespace,
                status = listing.status,
                "unable to list functions, namespace not deleted"
            );
            return Ok(NamespaceDeletion::ListFailed(listing));
        }

        let targets: Vec<String> = listed_function_names(&process_body(listing.body))
            .into_iter()
            .filter(|composite| split_function_name(Some(composite.as_str())).namespace == namespace)
            .collect();

        let mut outcome = DeleteOutcome::default();
        for composite in targets {
            outcome.attempted += 1;
            match self.controller.delete_function(&composite).await {
                Ok(response) if response.is_success() => {
                    debug!(function = %composite, "function deleted");
                }
                Ok(response) => {
                    warn!(
                        function = %composite,
                        status = response.status,
                        body = %response.body,
                        "unable to delete function"
                    );
                    outcome.failed.push(composite);
                }
                Err(e) => {
                    warn!(function = %composite, "unable to delete function: {:?}", e);
                    outcome.failed.push(composite);
                }
            }
        }

        info!(
            namespace,
            attempted = outcome.attempted,
            failed = outcome.failed.len(),
            "namespace functions deleted"
        );
        Ok(NamespaceDeletion::Completed(outcome))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use data_model::test_objects::tests::TEST_NAMESPACE;

    use super::*;
    use crate::testing::{FakeController, UpstreamCall};

    fn deleter(controller: &Arc<FakeController>) -> BulkNamespaceDeleter {
        BulkNamespaceDeleter::new(controller.clone())
    }

    #[tokio::test]
    async fn test_deletes_in_listing_order() -> Result<()> {
        let controller = Arc::new(FakeController::with_functions(&[
            (TEST_NAMESPACE, "one"),
            ("other", "keep"),
            (TEST_NAMESPACE, "two"),
            (TEST_NAMESPACE, "three"),
        ]));

        let deletion = deleter(&controller).delete_namespace(TEST_NAMESPACE).await?;
        assert_eq!(
            deletion,
            NamespaceDeletion::Completed(DeleteOutcome {
                attempted: 3,
                failed: vec![],
            })
        );
        assert_eq!(
            controller.calls(),
            vec![
                UpstreamCall::ListFunctions,
                UpstreamCall::DeleteFunction("simple___one".to_string()),
                UpstreamCall::DeleteFunction("simple___two".to_string()),
                UpstreamCall::DeleteFunction("simple___three".to_string()),
            ]
        );
        assert_eq!(controller.max_concurrent_deletes(), 1);
        assert_eq!(controller.deployed(), vec!["other___keep"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort() -> Result<()> {
        let controller = Arc::new(FakeController::with_functions(&[
            (TEST_NAMESPACE, "one"),
            (TEST_NAMESPACE, "two"),
            (TEST_NAMESPACE, "three"),
        ]));
        controller.fail_delete("simple___two");

        let deletion = deleter(&controller).delete_namespace(TEST_NAMESPACE).await?;
        let NamespaceDeletion::Completed(outcome) = deletion else {
            panic!("expected a completed deletion");
        };
        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.failed, vec!["simple___two".to_string()]);
        assert_eq!(controller.deployed(), vec!["simple___two"]);

        assert!(!PartialFailurePolicy::ReportSuccess.is_failure(&outcome));
        assert!(PartialFailurePolicy::ReportFailure.is_failure(&outcome));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_namespace() -> Result<()> {
        let controller = Arc::new(FakeController::with_functions(&[("other", "keep")]));

        let deletion = deleter(&controller).delete_namespace(TEST_NAMESPACE).await?;
        assert_eq!(
            deletion,
            NamespaceDeletion::Completed(DeleteOutcome::default())
        );
        assert_eq!(controller.calls(), vec![UpstreamCall::ListFunctions]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_failure_deletes_nothing() -> Result<()> {
        let controller = Arc::new(FakeController::with_functions(&[(TEST_NAMESPACE, "one")]));
        controller.fail_list(UpstreamResponse::new(500, "controller unavailable"));

        let deletion = deleter(&controller).delete_namespace(TEST_NAMESPACE).await?;
        assert_eq!(
            deletion,
            NamespaceDeletion::ListFailed(UpstreamResponse::new(500, "controller unavailable"))
        );
        assert_eq!(controller.calls(), vec![UpstreamCall::ListFunctions]);
        assert_eq!(controller.deployed(), vec!["simple___one"]);
        Ok(())
    }

    #[test]
    fn test_policy_ignores_clean_outcome() {
        let outcome = DeleteOutcome {
            attempted: 2,
            failed: vec![],
        };
        assert!(!PartialFailurePolicy::ReportFailure.is_failure(&outcome));
    }
}
