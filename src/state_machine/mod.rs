// Query lifecycle state machine
//
// Queries move DEFINED -> CREATED -> RUNNING -> CLOSED | CANCELED | FAILED.
// The executor tier drives the transitions; the task store validates them.

pub mod states;

pub use states::QueryLifecycle;
