// quiz-test-utils: shared test helpers for the session engine's
// integration test suite.

pub mod mock_ws_client;

pub use mock_ws_client::MockWsClient;
