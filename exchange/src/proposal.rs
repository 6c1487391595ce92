//! Contract type and proposal validation
//!
//! Pure checks and construction; escrow and persistence happen in
//! [`Exchange::submit_proposal`](crate::Exchange::submit_proposal).
//! Proposal timestamps come from the caller and are only range-checked.

use crate::{
    types::{ContractExtras, ContractProposal, ContractType, DataContract, DataKind, FileStatus, StreamType},
    Error, Result,
};
use rust_decimal::Decimal;

/// Reject a contract type whose own attributes are inconsistent
pub fn validate_contract_type(contract_type: &ContractType) -> Result<()> {
    if contract_type.id.is_empty() {
        return Err(Error::InvalidArgument("contract type ID must not be empty".to_string()));
    }

    if contract_type.price < Decimal::ZERO {
        return Err(Error::InvalidArgument(format!(
            "price must be non-negative, got {}",
            contract_type.price
        )));
    }

    let window = &contract_type.validity_window;
    if window.start > window.end {
        return Err(Error::InvalidArgument(format!("validity window is inverted: {}", window)));
    }

    if contract_type.data_kind == DataKind::Stream {
        if let Some(stream) = &contract_type.stream {
            let has_source = stream
                .source_endpoint
                .as_deref()
                .is_some_and(|endpoint| !endpoint.is_empty());
            if stream.stream_type == StreamType::Pull && !has_source {
                return Err(Error::InvalidArgument(
                    "stream source endpoint is required for PULL streams".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Check the proposal's timestamps against the contract type's window
pub fn validate_proposal(contract_type: &ContractType, proposal: &ContractProposal) -> Result<()> {
    let window = &contract_type.validity_window;

    if !window.contains(proposal.timestamp) {
        return Err(Error::InvalidArgument(format!(
            "contract creation time {} is outside contract window {}",
            proposal.timestamp.to_rfc3339(),
            window
        )));
    }

    if contract_type.data_kind == DataKind::Stream {
        let end = proposal.extras.end_date_time.ok_or_else(|| {
            Error::InvalidArgument("stream contracts require an end date time".to_string())
        })?;
        if !window.contains(end) {
            return Err(Error::InvalidArgument(format!(
                "contract end time {} is outside contract window {}",
                end.to_rfc3339(),
                window
            )));
        }
    }

    Ok(())
}

/// Contract record for an accepted proposal
pub fn build_contract(contract_type: &ContractType, proposal: &ContractProposal) -> DataContract {
    let extras = match contract_type.data_kind {
        DataKind::File => ContractExtras {
            file_status: Some(FileStatus::Proposal),
            end_date_time: proposal.extras.end_date_time,
            ..ContractExtras::default()
        },
        DataKind::Stream => ContractExtras {
            end_date_time: proposal.extras.end_date_time,
            ..ContractExtras::default()
        },
        DataKind::FileQueryable | DataKind::StreamQueryable => ContractExtras::default(),
    };

    DataContract {
        id: proposal.contract_id.clone(),
        provider_id: contract_type.provider_id.clone(),
        consumer_id: proposal.consumer_id.clone(),
        contract_type_id: contract_type.id.clone(),
        creation_time: proposal.timestamp,
        extras,
    }
}
