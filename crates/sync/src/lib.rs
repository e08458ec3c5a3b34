//! Tag-list synchronization against an asynchronous object store.
//!
//! [`TagSynchronizer`] binds an editable list of short text tags to the
//! reference set of an owner record and keeps both in sync under user edits,
//! external updates and autocompletion. It is assembled from:
//!
//! - [`SubscriptionManager`]: the owner's change and validation watches.
//! - [`SuggestionProvider`]: the query feeding the suggestion set and the tag list.
//! - [`WorkflowDispatcher`]: configured actions and flows run after a change.
//!
//! The engine spawns no tasks. The host drives it by awaiting operations and
//! draining subscription events.

pub mod alert;
mod error;
pub mod projection;
mod scope;
pub mod subscriptions;
pub mod suggestions;
mod synchronizer;
pub mod workflow;

pub use alert::{Alert, AlertKind};
pub use error::{Result, SyncError};
pub use projection::{TagEntry, TagListState, TagStatus};
pub use scope::{Cancelled, OwnerScope};
pub use subscriptions::{SubscriptionManager, SyncEvent, SyncEventKind};
pub use suggestions::{SuggestionProvider, SuggestionSet, substitute_owner};
pub use synchronizer::{AddOutcome, LoadOutcome, RemoveOutcome, TagSynchronizer};
pub use taglink_config::{ConfigError, Editable, TagConfig};
pub use workflow::{ConfiguredWorkflow, DispatchReport, WorkflowAction, WorkflowDispatcher, WorkflowFailure, WorkflowTrigger};
