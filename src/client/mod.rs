/// Optimistic group editor with rollback to the confirmed state.
pub mod editor;
/// Debounced save lifecycle state machine.
pub mod machine;
/// Tokio driver performing the saves of one editor.
pub mod runner;
