//! The dimension-range reduction and broadcast run before clustering.

use super::{
    tree::{forward_to_children, gather_children, receive_from_parent, send_to_parent, Stream},
    Link, Message, Tag,
};
use crate::{DimensionRange, Result, TdbscanError};

/// Reduces the local ranges of every worker to the global range and hands
/// it back to every worker.
///
/// Children send `RANGE` frames ended by `ALL_RANGES_SENT`; the merged range
/// goes up the same way, and the root sends `GLOBAL_RANGE` down.
///
/// # Errors
///
/// * If ranges of different dimensionalities meet.
/// * On any protocol failure.
pub fn exchange_ranges<L: Link + ?Sized>(link: &L, local: DimensionRange) -> Result<DimensionRange> {
    let rank = link.rank();
    let mut merged = local;
    gather_children(
        link,
        "ranges",
        &[Stream::terminated(Tag::Range, Tag::AllRangesSent)],
        |from, frame| match Message::from_frame(frame)? {
            Message::Range(range) => {
                merged = merged.merge(&range).map_err(|e| {
                    TdbscanError::protocol(rank, format!("Range from child {from} does not fit: {e}"))
                })?;
                Ok(())
            }
            _ => Err(TdbscanError::protocol(rank, "RANGE frame did not decode to a range")),
        },
    )?;

    let global = if link.is_root() {
        merged
    } else {
        send_to_parent(link, &Message::Range(merged))?;
        send_to_parent(link, &Message::AllRangesSent)?;
        let frame = receive_from_parent(link, Tag::GlobalRange, "the global range")?;
        match Message::from_frame(&frame)? {
            Message::GlobalRange(range) => range,
            _ => return Err(TdbscanError::protocol(rank, "GLOBAL_RANGE frame did not decode to a range")),
        }
    };

    forward_to_children(link, &Message::GlobalRange(global.clone()).to_frame()?)?;
    ftlog::debug!("Worker {rank} has the global range of {} dimensions.", global.dimensionality());
    Ok(global)
}
