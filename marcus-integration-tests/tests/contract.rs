//! Runs the shared board-provider contract suite against the in-memory
//! stand-in, so the contract helpers in `marcus-mocks` stay honest against
//! at least one real implementation rather than existing only for adapters
//! that need network access to exercise.

use marcus_board_providers::InMemoryBoardProvider;
use marcus_mocks::test_provider_contract;

#[tokio::test]
async fn in_memory_provider_satisfies_the_shared_contract() {
    let provider = InMemoryBoardProvider::new();
    test_provider_contract(&provider).await;
}
