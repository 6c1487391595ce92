//! FILE contract delivery state machine
//!
//! ```text
//! PROPOSAL --mark_shipped--> SHIPPED --mark_received--> RECEIVED
//! ```
//!
//! Only FILE contracts carry a status. RECEIVED is terminal. Payment is
//! released on the PROPOSAL -> SHIPPED edge, driven by
//! [`Exchange::mark_shipped`](crate::Exchange::mark_shipped).

use crate::{
    types::{DataContract, FileHash, FileStatus},
    Error, Result,
};

impl FileStatus {
    /// Status reached by the only transition out of this one
    pub fn next(self) -> Option<FileStatus> {
        match self {
            FileStatus::Proposal => Some(FileStatus::Shipped),
            FileStatus::Shipped => Some(FileStatus::Received),
            FileStatus::Received => None,
        }
    }

    /// True for RECEIVED
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Check if `self -> to` is allowed
    pub fn can_transition_to(self, to: FileStatus) -> bool {
        self.next() == Some(to)
    }
}

/// Fail with `InvalidStateTransition` unless `contract` may move to `to`
pub fn ensure_transition(contract: &DataContract, to: FileStatus) -> Result<FileStatus> {
    match contract.extras.file_status {
        Some(from) if from.can_transition_to(to) => Ok(from),
        Some(from) => {
            tracing::warn!(contract = %contract.id, %from, %to, "Rejected contract transition");
            Err(Error::InvalidStateTransition {
                contract_id: contract.id.clone(),
                from: from.to_string(),
                to,
            })
        }
        None => {
            tracing::warn!(contract = %contract.id, %to, "Lifecycle transition on non-file contract");
            Err(Error::InvalidStateTransition {
                contract_id: contract.id.clone(),
                from: "no file status (not a FILE contract)".to_string(),
                to,
            })
        }
    }
}

/// Copy of `contract` moved to `to`, with `hash` recorded when given
pub fn advance(contract: &DataContract, to: FileStatus, hash: Option<FileHash>) -> DataContract {
    let mut next = contract.clone();
    next.extras.file_status = Some(to);
    if let Some(hash) = hash {
        next.extras.file_hash = Some(hash);
    }
    next
}
