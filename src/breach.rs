//! Zone breach evaluation.

use crate::detect::Detection;
use crate::zone::Zone;

/// True iff at least one well-formed detection overlaps the zone.
///
/// Detections with non-finite or inverted coordinates are ignored rather than
/// trusted. No class or confidence filtering happens here; the detector has
/// already applied its threshold.
pub fn is_breached(detections: &[Detection], zone: &Zone) -> bool {
    breaching(detections, *zone).next().is_some()
}

/// Detections that overlap the zone, in detector order.
pub fn breaching(detections: &[Detection], zone: Zone) -> impl Iterator<Item = &Detection> {
    detections
        .iter()
        .filter(|d| d.bbox.is_well_formed())
        .filter(move |d| zone.intersects(&d.bbox))
}
