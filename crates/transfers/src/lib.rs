//! Store-to-store transfers.
//!
//! A transfer moves one variant between two stores without going through HQ.
//! The aggregate only decides transitions; the stock movements its events
//! describe are applied by the infrastructure layer.

pub mod transfer;

pub use transfer::{
    ReceiveTransfer, RejectTransfer, RequestTransfer, ShipTransfer, Transfer, TransferCommand,
    TransferEvent, TransferReceived, TransferRejected, TransferRequested, TransferShipped,
    TransferStatus,
};
