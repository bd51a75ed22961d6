//! SRV response decoding and target ordering.

use crate::record::TargetSet;
use rand::Rng;
use std::time::Instant;

mod decode;
mod order;

pub use decode::{decode_ptr, decode_srv, DecodeError};
#[cfg(feature = "hickory")]
pub(crate) use decode::presentation;
pub use order::order_srv_records;

/// Decodes a raw SRV response into the targets to try, in order.
///
/// A response whose only record targets the root name `"."` declares that the
/// service is not available, which yields an empty set. `None` is returned
/// when the response holds no SRV answer at all.
pub fn target_set(
    response: &[u8],
    received_at: Instant,
    rng: impl Rng,
) -> Result<Option<TargetSet>, DecodeError> {
    let mut targets = decode_srv(response, received_at)?;
    match targets.as_slice() {
        [] => return Ok(None),
        [only] if only.hostname == "." => return Ok(Some(TargetSet::default())),
        _ => {}
    }
    order_srv_records(&mut targets, rng);
    Ok(Some(TargetSet::new(targets)))
}

#[cfg(test)]
pub(crate) use decode::tests::MessageBuilder;
