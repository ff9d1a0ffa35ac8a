//! Mock implementation of the MutableProcessInstances trait.

use async_trait::async_trait;
use mockall::mock;
use rill_core::{CoreError, MutableProcessInstances, ProcessInstanceView};

mock! {
    pub ProcessInstances {}

    #[async_trait]
    impl MutableProcessInstances for ProcessInstances {
        async fn find_by_id(&self, id: &str) -> Result<Option<ProcessInstanceView>, CoreError>;
        async fn exists(&self, id: &str) -> Result<bool, CoreError>;
        async fn update(&self, id: &str, instance: &ProcessInstanceView) -> Result<(), CoreError>;
        async fn remove(&self, id: &str) -> Result<(), CoreError>;
        async fn values(&self) -> Result<Vec<ProcessInstanceView>, CoreError>;
    }
}

/// Creates a mock store that accepts every write and finds nothing.
pub fn create_mock_process_instances() -> MockProcessInstances {
    let mut mock = MockProcessInstances::new();

    mock.expect_find_by_id().returning(|_| Ok(None));
    mock.expect_exists().returning(|_| Ok(false));
    mock.expect_update().returning(|_, _| Ok(()));
    mock.expect_remove().returning(|_| Ok(()));
    mock.expect_values().returning(|| Ok(Vec::new()));

    mock
}

/// Creates a mock store whose writes all fail with `message`.
pub fn create_failing_process_instances(message: &str) -> MockProcessInstances {
    let mut mock = MockProcessInstances::new();
    let update_message = message.to_string();
    let remove_message = message.to_string();

    mock.expect_update()
        .returning(move |_, _| Err(CoreError::StateStoreError(update_message.clone())));
    mock.expect_remove()
        .returning(move |_| Err(CoreError::StateStoreError(remove_message.clone())));

    mock
}
