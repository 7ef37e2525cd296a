use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockhub_auth::{authorize_store, Action, Actor};
use stockhub_core::{Aggregate, AggregateRoot, DomainError, StoreId, TransferId, VariantId};

/// Transfer status lifecycle. RECEIVED and REJECTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Requested,
    Shipped,
    Received,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Requested => "REQUESTED",
            TransferStatus::Shipped => "SHIPPED",
            TransferStatus::Received => "RECEIVED",
            TransferStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Received | TransferStatus::Rejected)
    }
}

/// Aggregate root: Transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    id: TransferId,
    source: Option<StoreId>,
    target: Option<StoreId>,
    variant: Option<VariantId>,
    quantity: i64,
    status: TransferStatus,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Transfer {
    /// Create an empty, not-yet-requested aggregate instance.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            source: None,
            target: None,
            variant: None,
            quantity: 0,
            status: TransferStatus::Requested,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn source(&self) -> Option<StoreId> {
        self.source
    }

    pub fn target(&self) -> Option<StoreId> {
        self.target
    }

    pub fn variant(&self) -> Option<VariantId> {
        self.variant
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_requested(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestTransfer (issued by the receiving store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTransfer {
    pub transfer_id: TransferId,
    pub source: StoreId,
    pub target: StoreId,
    pub variant: VariantId,
    pub quantity: i64,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipTransfer (issued by the source store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTransfer {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveTransfer (issued by the target store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveTransfer {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectTransfer (issued by the source store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectTransfer {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Request(RequestTransfer),
    Ship(ShipTransfer),
    Receive(ReceiveTransfer),
    Reject(RejectTransfer),
}

/// Event: TransferRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequested {
    pub transfer_id: TransferId,
    pub source: StoreId,
    pub target: StoreId,
    pub variant: VariantId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferShipped. The source store is debited (kind SHIP_OUT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShipped {
    pub transfer_id: TransferId,
    pub source: StoreId,
    pub variant: VariantId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferReceived. The target store is credited (kind SHIP_IN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceived {
    pub transfer_id: TransferId,
    pub target: StoreId,
    pub variant: VariantId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferRejected. No stock effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRejected {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    Requested(TransferRequested),
    Shipped(TransferShipped),
    Received(TransferReceived),
    Rejected(TransferRejected),
}

impl TransferEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Requested(_) => "transfers.transfer.requested",
            TransferEvent::Shipped(_) => "transfers.transfer.shipped",
            TransferEvent::Received(_) => "transfers.transfer.received",
            TransferEvent::Rejected(_) => "transfers.transfer.rejected",
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Requested(e) => {
                self.id = e.transfer_id;
                self.source = Some(e.source);
                self.target = Some(e.target);
                self.variant = Some(e.variant);
                self.quantity = e.quantity;
                self.status = TransferStatus::Requested;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            TransferEvent::Shipped(e) => {
                self.status = TransferStatus::Shipped;
                self.updated_at = Some(e.occurred_at);
            }
            TransferEvent::Received(e) => {
                self.status = TransferStatus::Received;
                self.updated_at = Some(e.occurred_at);
            }
            TransferEvent::Rejected(e) => {
                self.status = TransferStatus::Rejected;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Request(cmd) => self.handle_request(cmd),
            TransferCommand::Ship(cmd) => self.handle_ship(cmd),
            TransferCommand::Receive(cmd) => self.handle_receive(cmd),
            TransferCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Transfer {
    /// Parties and line of a requested transfer.
    fn requested_parts(&self) -> Result<(StoreId, StoreId, VariantId), DomainError> {
        match (self.created, self.source, self.target, self.variant) {
            (true, Some(source), Some(target), Some(variant)) => Ok((source, target, variant)),
            _ => Err(DomainError::not_found(format!("transfer {}", self.id))),
        }
    }

    fn ensure_status(&self, expected: TransferStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} transfer {} in status {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn handle_request(&self, cmd: &RequestTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("transfer already requested"));
        }
        if cmd.transfer_id != self.id {
            return Err(DomainError::validation("transfer_id mismatch"));
        }
        authorize_store(&cmd.actor, cmd.target, Action::RequestTransfer)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.source == cmd.target {
            return Err(DomainError::validation(
                "source and target store must differ",
            ));
        }

        Ok(vec![TransferEvent::Requested(TransferRequested {
            transfer_id: cmd.transfer_id,
            source: cmd.source,
            target: cmd.target,
            variant: cmd.variant,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        let (source, _, variant) = self.requested_parts()?;
        authorize_store(&cmd.actor, source, Action::ShipTransfer)?;
        self.ensure_status(TransferStatus::Requested, "ship")?;

        Ok(vec![TransferEvent::Shipped(TransferShipped {
            transfer_id: self.id,
            source,
            variant,
            quantity: self.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        let (_, target, variant) = self.requested_parts()?;
        authorize_store(&cmd.actor, target, Action::ReceiveTransfer)?;
        self.ensure_status(TransferStatus::Shipped, "receive")?;

        Ok(vec![TransferEvent::Received(TransferReceived {
            transfer_id: self.id,
            target,
            variant,
            quantity: self.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        let (source, _, _) = self.requested_parts()?;
        authorize_store(&cmd.actor, source, Action::RejectTransfer)?;
        self.ensure_status(TransferStatus::Requested, "reject")?;

        Ok(vec![TransferEvent::Rejected(TransferRejected {
            transfer_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
