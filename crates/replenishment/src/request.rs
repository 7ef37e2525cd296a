use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockhub_auth::{authorize_hq, authorize_store, Action, Actor};
use stockhub_core::{
    Aggregate, AggregateRoot, DomainError, ReplenishmentId, StoreId, UserId, VariantId,
};

/// Which way stock moves between HQ and the store once approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Store pulls stock from HQ.
    Order,
    /// Store pushes stock back to HQ.
    Return,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Order => "order",
            Direction::Return => "return",
        }
    }
}

/// Request status lifecycle. APPROVED and REJECTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Requested,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Requested => "REQUESTED",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

/// Aggregate root: ReplenishmentRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplenishmentRequest {
    id: ReplenishmentId,
    direction: Direction,
    store: Option<StoreId>,
    variant: Option<VariantId>,
    requested_quantity: i64,
    confirmed_quantity: Option<i64>,
    requested_for: Option<NaiveDate>,
    note: Option<String>,
    status: RequestStatus,
    requested_by: Option<UserId>,
    processed_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl ReplenishmentRequest {
    /// Create an empty, not-yet-submitted aggregate instance.
    pub fn empty(id: ReplenishmentId) -> Self {
        Self {
            id,
            direction: Direction::Order,
            store: None,
            variant: None,
            requested_quantity: 0,
            confirmed_quantity: None,
            requested_for: None,
            note: None,
            status: RequestStatus::Requested,
            requested_by: None,
            processed_by: None,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReplenishmentId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn variant(&self) -> Option<VariantId> {
        self.variant
    }

    pub fn requested_quantity(&self) -> i64 {
        self.requested_quantity
    }

    /// Settled at approval; may differ from the requested quantity.
    pub fn confirmed_quantity(&self) -> Option<i64> {
        self.confirmed_quantity
    }

    pub fn requested_for(&self) -> Option<NaiveDate> {
        self.requested_for
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn processed_by(&self) -> Option<UserId> {
        self.processed_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_submitted(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for ReplenishmentRequest {
    type Id = ReplenishmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRequest (issued by the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub request_id: ReplenishmentId,
    pub direction: Direction,
    pub store: StoreId,
    pub variant: VariantId,
    pub quantity: i64,
    pub requested_for: NaiveDate,
    pub note: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveRequest (HQ only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub confirmed_quantity: i64,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest (HQ only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplenishmentCommand {
    Create(CreateRequest),
    Approve(ApproveRequest),
    Reject(RejectRequest),
}

/// Event: ReplenishmentRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentRequested {
    pub request_id: ReplenishmentId,
    pub direction: Direction,
    pub store: StoreId,
    pub variant: VariantId,
    pub quantity: i64,
    pub requested_for: NaiveDate,
    pub note: Option<String>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReplenishmentApproved.
///
/// Order: HQ quantity −confirmed, store +confirmed (ORDER_IN).
/// Return: store −confirmed (RETURN_OUT), HQ quantity +confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentApproved {
    pub request_id: ReplenishmentId,
    pub direction: Direction,
    pub store: StoreId,
    pub variant: VariantId,
    pub confirmed_quantity: i64,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl ReplenishmentApproved {
    /// Signed change to the store's quantity.
    pub fn store_delta(&self) -> i64 {
        match self.direction {
            Direction::Order => self.confirmed_quantity,
            Direction::Return => -self.confirmed_quantity,
        }
    }

    /// Signed change to the HQ-held quantity; always the opposite of the store side.
    pub fn hq_delta(&self) -> i64 {
        -self.store_delta()
    }
}

/// Event: ReplenishmentRejected. No stock effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentRejected {
    pub request_id: ReplenishmentId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplenishmentEvent {
    Requested(ReplenishmentRequested),
    Approved(ReplenishmentApproved),
    Rejected(ReplenishmentRejected),
}

impl ReplenishmentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ReplenishmentEvent::Requested(_) => "replenishment.request.created",
            ReplenishmentEvent::Approved(_) => "replenishment.request.approved",
            ReplenishmentEvent::Rejected(_) => "replenishment.request.rejected",
        }
    }
}

impl Aggregate for ReplenishmentRequest {
    type Command = ReplenishmentCommand;
    type Event = ReplenishmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReplenishmentEvent::Requested(e) => {
                self.id = e.request_id;
                self.direction = e.direction;
                self.store = Some(e.store);
                self.variant = Some(e.variant);
                self.requested_quantity = e.quantity;
                self.requested_for = Some(e.requested_for);
                self.note = e.note.clone();
                self.status = RequestStatus::Requested;
                self.requested_by = Some(e.requested_by);
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            ReplenishmentEvent::Approved(e) => {
                self.status = RequestStatus::Approved;
                self.confirmed_quantity = Some(e.confirmed_quantity);
                self.processed_by = Some(e.approved_by);
                self.updated_at = Some(e.occurred_at);
            }
            ReplenishmentEvent::Rejected(e) => {
                self.status = RequestStatus::Rejected;
                self.processed_by = Some(e.rejected_by);
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReplenishmentCommand::Create(cmd) => self.handle_create(cmd),
            ReplenishmentCommand::Approve(cmd) => self.handle_approve(cmd),
            ReplenishmentCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl ReplenishmentRequest {
    fn ensure_pending(&self) -> Result<(StoreId, VariantId), DomainError> {
        let (store, variant) = match (self.created, self.store, self.variant) {
            (true, Some(store), Some(variant)) => (store, variant),
            _ => {
                return Err(DomainError::not_found(format!(
                    "replenishment request {}",
                    self.id
                )))
            }
        };
        if self.status != RequestStatus::Requested {
            return Err(DomainError::invalid_state(format!(
                "{} request {} is already {}",
                self.direction.as_str(),
                self.id,
                self.status.as_str()
            )));
        }
        Ok((store, variant))
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<ReplenishmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("request already submitted"));
        }
        if cmd.request_id != self.id {
            return Err(DomainError::validation("request_id mismatch"));
        }
        authorize_store(&cmd.actor, cmd.store, Action::RequestReplenishment)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![ReplenishmentEvent::Requested(ReplenishmentRequested {
            request_id: cmd.request_id,
            direction: cmd.direction,
            store: cmd.store,
            variant: cmd.variant,
            quantity: cmd.quantity,
            requested_for: cmd.requested_for,
            note: cmd.note.clone(),
            requested_by: cmd.actor.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveRequest) -> Result<Vec<ReplenishmentEvent>, DomainError> {
        authorize_hq(&cmd.actor, Action::ApproveReplenishment)?;
        let (store, variant) = self.ensure_pending()?;

        // No relation to the requested quantity is enforced.
        if cmd.confirmed_quantity <= 0 {
            return Err(DomainError::validation("confirmed quantity must be positive"));
        }

        Ok(vec![ReplenishmentEvent::Approved(ReplenishmentApproved {
            request_id: self.id,
            direction: self.direction,
            store,
            variant,
            confirmed_quantity: cmd.confirmed_quantity,
            approved_by: cmd.actor.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<ReplenishmentEvent>, DomainError> {
        authorize_hq(&cmd.actor, Action::RejectReplenishment)?;
        self.ensure_pending()?;

        Ok(vec![ReplenishmentEvent::Rejected(ReplenishmentRejected {
            request_id: self.id,
            rejected_by: cmd.actor.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
