//! Variant selection policies

use crate::types::{StreamDescriptor, StreamSelection, StreamVariant};

/// Pick one variant according to `selection`
///
/// - [`StreamSelection::First`] takes the first variant in provider order.
/// - [`StreamSelection::HighestResolution`] takes the tallest variant; variants
///   without a reported height rank lowest and ties keep provider order.
///
/// Returns `None` for an empty list.
pub fn select_stream_variant(
    variants: Vec<StreamVariant>,
    selection: StreamSelection,
) -> Option<StreamDescriptor> {
    let chosen = match selection {
        StreamSelection::First => variants.into_iter().next(),
        StreamSelection::HighestResolution => {
            let mut best: Option<StreamVariant> = None;
            for variant in variants {
                let better = match &best {
                    None => true,
                    Some(current) => variant.height.unwrap_or(0) > current.height.unwrap_or(0),
                };
                if better {
                    best = Some(variant);
                }
            }
            best
        }
    };
    chosen.map(StreamDescriptor::from)
}
