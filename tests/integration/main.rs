//! Integration tests: listing feeds → universe → batch → CSV → ranking,
//! driven by in-memory mocks.

mod mock_provider;
mod pipeline;
