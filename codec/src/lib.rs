//! Field-level snapshot and delta encoding for ghostsnap.
//!
//! This is the main codec crate that ties together bitstream, wire, and schema
//! to serialize replicated records ("ghosts") and input commands.
//!
//! # Features
//!
//! - Per-field codecs with quantization, packed deltas and interpolation
//! - Change masks with aggregate (composite) bits
//! - Full and delta snapshots against an explicit baseline
//! - Variable-length buffer fields with per-element masks
//! - Tick-indexed history rings and redundant command packets
//!
//! # Design Principles
//!
//! - **Correctness first** - All invariants are documented and tested.
//! - **Plan once** - Type classification happens when the plan is built, never
//!   per value.
//! - **Deterministic** - Same inputs produce same outputs.
//! - **All or nothing** - Encoders append to caller buffers only on success.

mod buffer;
mod command;
mod error;
mod field;
mod history;
mod limits;
mod mask;
mod reader;
mod record;
mod ring;
mod scratch;
mod snapshot;
mod types;
mod writer;

pub use buffer::{required_size, BufferRegion, DynamicBufferRing};
pub use command::{
    decode_command_packet, encode_command_packet, InputEvent, DEFAULT_COMMAND_REDUNDANCY,
};
pub use error::{CodecError, CodecResult, LimitKind, MaskReason, ValueReason};
pub use field::{
    default_value, dequantize, from_slot, interpolate, quantize, read_packed, read_raw, to_slot,
    validate, write_packed, write_raw, FieldValue,
};
pub use history::SnapshotHistory;
pub use limits::CodecLimits;
pub use mask::ChangeMask;
pub use reader::{interpolate_records, read_interpolated, read_snapshot};
pub use record::Record;
pub use ring::TickRing;
pub use scratch::CodecScratch;
pub use snapshot::{decode_snapshot_from_packet, decode_snapshot_packet, encode_snapshot_packet};
pub use types::{EntityId, SnapshotTick};
pub use wire::Limits as WireLimits;
pub use writer::{write_snapshot, BufferSnapshot, Snapshot};
