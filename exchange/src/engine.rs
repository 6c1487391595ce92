//! Main exchange engine
//!
//! Ties contract types and contracts to the ledger: proposals escrow the
//! price with `approve`, shipment releases it with `transfer_from`.

use crate::{
    config::{Config, ShipmentPolicy},
    identity::{IdentityResolver, PrefixedAccountResolver},
    lifecycle,
    metrics::ExchangeMetrics,
    proposal,
    types::{ContractProposal, ContractType, DataContract, FileHash, FileStatus},
    Error, Result,
};
use datamarket_ledger::{storage, AccountId, EntityKind, Ledger, Saga, StateStore, TracingSink};
use std::sync::Arc;

/// Data marketplace exchange
pub struct Exchange<S: ?Sized> {
    /// Ledger holding accounts, escrow and every exchange record
    ledger: Ledger<S>,

    /// Party to account mapping
    identity: Arc<dyn IdentityResolver>,

    /// Behavior on payment release failure
    shipment_policy: ShipmentPolicy,

    /// Exchange counters
    metrics: ExchangeMetrics,
}

impl<S: ?Sized> std::fmt::Debug for Exchange<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("shipment_policy", &self.shipment_policy)
            .finish_non_exhaustive()
    }
}

impl Exchange<dyn StateStore> {
    /// Open the configured store and build an exchange over it
    pub fn open(config: &Config) -> Result<Self> {
        let store = storage::open(&config.ledger.storage)?;
        let ledger = Ledger::new(store)?.with_event_sink(Arc::new(TracingSink));

        tracing::info!(
            service = %config.service_name,
            backend = ?config.ledger.storage.backend,
            "Exchange opened"
        );
        Self::new(ledger, config)
    }
}

impl<S: StateStore + ?Sized> Exchange<S> {
    /// Create new exchange over `ledger`
    pub fn new(ledger: Ledger<S>, config: &Config) -> Result<Self> {
        let metrics = ExchangeMetrics::new(ledger.metrics().registry())?;

        Ok(Self {
            ledger,
            identity: Arc::new(PrefixedAccountResolver::new(&config.identity.account_prefix)),
            shipment_policy: config.lifecycle.shipment_policy,
            metrics,
        })
    }

    /// Set identity resolver
    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity = resolver;
        self
    }

    /// Underlying ledger
    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Exchange counters
    pub fn metrics(&self) -> &ExchangeMetrics {
        &self.metrics
    }

    /// Ledger account of a party
    pub fn account_for(&self, party_id: &str) -> Result<AccountId> {
        self.identity.resolve_account_id(party_id)
    }

    /// Register a provider's contract type
    pub fn register_contract_type(&self, contract_type: ContractType) -> Result<ContractType> {
        proposal::validate_contract_type(&contract_type)?;

        let provider = self.account_for(&contract_type.provider_id)?;
        self.ledger.get_account(&provider)?;

        self.ledger.repository().insert(&contract_type)?;
        self.metrics.contract_types_registered.inc();

        tracing::info!(
            contract_type = %contract_type.id,
            provider = %contract_type.provider_id,
            price = %contract_type.price,
            kind = ?contract_type.data_kind,
            "Contract type registered"
        );
        Ok(contract_type)
    }

    /// Load a contract type
    pub fn get_contract_type(&self, id: &str) -> Result<ContractType> {
        Ok(self.ledger.repository().get(id)?)
    }

    /// Load a contract
    pub fn get_contract(&self, id: &str) -> Result<DataContract> {
        Ok(self.ledger.repository().get(id)?)
    }

    /// Turn a proposal into a contract, escrowing its price
    ///
    /// The consumer approves the provider for the contract type's price
    /// (replacing any earlier approval to that provider). If any later check
    /// rejects the proposal, the consumer's previous allowance is restored.
    pub fn submit_proposal(&self, proposal: &ContractProposal) -> Result<DataContract> {
        match self.try_submit_proposal(proposal) {
            Ok(contract) => {
                self.metrics.proposals_accepted.inc();
                tracing::info!(
                    contract = %contract.id,
                    consumer = %contract.consumer_id,
                    provider = %contract.provider_id,
                    "Proposal accepted"
                );
                Ok(contract)
            }
            Err(e) => {
                self.metrics.proposals_rejected.inc();
                tracing::warn!(contract = %proposal.contract_id, error = %e, "Proposal rejected");
                Err(e)
            }
        }
    }

    fn try_submit_proposal(&self, request: &ContractProposal) -> Result<DataContract> {
        let consumer = self.account_for(&request.consumer_id)?;
        self.ledger.get_account(&consumer)?;
        let contract_type = self.get_contract_type(&request.contract_type_id)?;
        let provider = self.account_for(&contract_type.provider_id)?;

        let previous = self.ledger.allowance_entry(&consumer, &provider)?;

        let mut saga: Saga<'_, Error> = Saga::new("submit_proposal");
        let outcome = self.run_submission(&mut saga, request, &contract_type, &consumer, &provider, previous);
        if outcome.is_err() {
            self.ledger
                .metrics()
                .record_rollback(saga.compensated().len(), saga.failed_compensations().len());
            return outcome;
        }
        saga.complete();
        outcome
    }

    fn run_submission<'a>(
        &'a self,
        saga: &mut Saga<'a, Error>,
        request: &ContractProposal,
        contract_type: &ContractType,
        consumer: &'a AccountId,
        provider: &'a AccountId,
        previous: Option<rust_decimal::Decimal>,
    ) -> Result<DataContract> {
        saga.run_step(
            "escrow_payment",
            || {
                self.ledger
                    .approve(consumer, provider, contract_type.price)
                    .map_err(|source| Error::PaymentNotApproved {
                        consumer: consumer.to_string(),
                        provider: provider.to_string(),
                        source,
                    })
            },
            move || Ok(self.ledger.restore_allowance(consumer, provider, previous)?),
        )?;
        tracing::debug!(consumer = %consumer, provider = %provider, price = %contract_type.price, "Payment escrowed");

        saga.run_final("validate_proposal", || {
            if self.ledger.repository().exists(&request.contract_id)? {
                return Err(datamarket_ledger::Error::AlreadyExists {
                    kind: EntityKind::DataContract,
                    id: request.contract_id.clone(),
                }
                .into());
            }
            proposal::validate_proposal(contract_type, request)
        })?;

        let contract = proposal::build_contract(contract_type, request);
        saga.run_final("record_contract", || Ok(self.ledger.repository().insert(&contract)?))?;
        Ok(contract)
    }

    /// Record shipment of a FILE contract and release its payment
    ///
    /// Writes SHIPPED with the data hash, then moves the contract price from
    /// consumer to provider. When the transfer fails the contract ends in
    /// PROPOSAL or SHIPPED depending on the configured [`ShipmentPolicy`],
    /// and the caller gets [`Error::Settlement`] naming that status.
    pub fn mark_shipped(&self, contract_id: &str, hash: FileHash) -> Result<DataContract> {
        let contract = self.get_contract(contract_id)?;
        lifecycle::ensure_transition(&contract, FileStatus::Shipped)?;

        let contract_type = self.get_contract_type(&contract.contract_type_id)?;
        let consumer = self.account_for(&contract.consumer_id)?;
        let provider = self.account_for(&contract.provider_id)?;
        let shipped = lifecycle::advance(&contract, FileStatus::Shipped, Some(hash));

        let mut saga: Saga<'_, Error> = Saga::new("mark_shipped");
        match self.shipment_policy {
            ShipmentPolicy::RevertOnFailure => saga.run_step(
                "record_shipment",
                || Ok(self.ledger.repository().put(&shipped)?),
                move || Ok(self.ledger.repository().put(&contract)?),
            )?,
            ShipmentPolicy::KeepShipped => {
                saga.run_final("record_shipment", || Ok(self.ledger.repository().put(&shipped)?))?
            }
        }

        let released = saga.run_final("release_payment", || {
            Ok(self.ledger.transfer_from(&consumer, &provider, contract_type.price)?)
        });

        if let Err(source) = released {
            let status = if saga.compensated().contains(&"record_shipment") {
                FileStatus::Proposal
            } else {
                FileStatus::Shipped
            };
            self.ledger
                .metrics()
                .record_rollback(saga.compensated().len(), saga.failed_compensations().len());
            self.metrics.settlement_failures.inc();

            tracing::error!(
                contract = contract_id,
                %status,
                policy = ?self.shipment_policy,
                error = %source,
                "Payment release failed after shipment"
            );
            return Err(Error::Settlement {
                contract_id: contract_id.to_string(),
                status,
                source: Box::new(source),
            });
        }
        saga.complete();

        self.metrics.contracts_shipped.inc();
        tracing::info!(
            contract = contract_id,
            consumer = %consumer,
            provider = %provider,
            price = %contract_type.price,
            "Contract shipped, payment released"
        );
        Ok(shipped)
    }

    /// Confirm receipt of a shipped FILE contract (terminal)
    pub fn mark_received(&self, contract_id: &str) -> Result<DataContract> {
        let contract = self.get_contract(contract_id)?;
        lifecycle::ensure_transition(&contract, FileStatus::Received)?;

        let received = lifecycle::advance(&contract, FileStatus::Received, None);
        self.ledger.repository().put(&received)?;
        self.metrics.contracts_received.inc();

        tracing::info!(contract = contract_id, "Contract received");
        Ok(received)
    }
}
