//! Precomputed slot tables.

use crate::error::Result;
use crate::family::DetectorFamilyConfig;
use crate::granularity::Granularity;
use crate::layout::{GeometrySlot, Layout, SlotExtent};
use log::debug;
use petring_core::Error as CoreError;
use rayon::prelude::*;

/// Every slot of one (family, granularity), addressable by flat index.
///
/// Built once and shared read-only between readout workers.
#[derive(Debug, Clone)]
pub struct SlotTable {
    layout: Layout,
    slots: Vec<GeometrySlot>,
}

impl SlotTable {
    /// Builds the table for the configured number of rings.
    ///
    /// # Errors
    /// Returns a configuration error if the configuration is invalid or
    /// does not support `granularity`.
    pub fn build(config: &DetectorFamilyConfig, granularity: Granularity) -> Result<Self> {
        let layout = Layout::new(config, granularity)?;
        Self::from_layout(layout)
    }

    /// Builds a table holding exactly `count` slots, deriving the ring count.
    ///
    /// # Errors
    /// Returns `NonPositiveCount` for `count <= 0`, `NonIntegralCount` if
    /// `count` is not a whole number of rings, and a configuration error for
    /// panels unless `count` equals the number of panels.
    pub fn build_with_count(
        config: &DetectorFamilyConfig,
        granularity: Granularity,
        count: i64,
    ) -> Result<Self> {
        let count = usize::try_from(count)
            .ok()
            .filter(|&c| c > 0)
            .ok_or(CoreError::NonPositiveCount(count))?;

        let one_ring = config.clone().with_rings(1);
        let per_ring = Layout::new(&one_ring, granularity)?.slots_per_ring();
        if count % per_ring != 0 {
            return Err(CoreError::NonIntegralCount { count, per_ring }.into());
        }

        let rings = count / per_ring;
        if granularity == Granularity::Panel && rings != 1 {
            return Err(CoreError::ConfigError(format!(
                "panels span the full axial length; expected {per_ring} slots, got {count}"
            ))
            .into());
        }

        let config = if granularity == Granularity::Panel {
            config.clone()
        } else {
            config.clone().with_rings(rings)
        };
        Self::build(&config, granularity)
    }

    fn from_layout(layout: Layout) -> Result<Self> {
        let len = layout.len();
        if len == 0 {
            return Err(CoreError::ConfigError("layout has no slots".to_string()).into());
        }

        let slots = (0..len)
            .into_par_iter()
            .map(|index| layout.resolve(index))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "built {} {} slot table: {} slots over {} rings",
            layout.family(),
            layout.granularity(),
            len,
            layout.rings()
        );

        Ok(Self { layout, slots })
    }

    /// Looks up a slot by flat index.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if the table does not cover `index`.
    pub fn get(&self, index: usize) -> Result<&GeometrySlot> {
        self.slots.get(index).ok_or_else(|| {
            CoreError::IndexOutOfRange {
                index,
                len: self.slots.len(),
            }
            .into()
        })
    }

    /// True if `index` addresses a slot.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.slots.len()
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in flat-index order.
    #[must_use]
    pub fn slots(&self) -> &[GeometrySlot] {
        &self.slots
    }

    /// Iterates over slots in flat-index order.
    pub fn iter(&self) -> std::slice::Iter<'_, GeometrySlot> {
        self.slots.iter()
    }

    /// Resolver the table was built from.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Box half-sizes shared by every slot.
    #[must_use]
    pub fn extent(&self) -> SlotExtent {
        self.layout.extent()
    }

    /// Granularity of the table.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.layout.granularity()
    }
}

impl<'a> IntoIterator for &'a SlotTable {
    type Item = &'a GeometrySlot;
    type IntoIter = std::slice::Iter<'a, GeometrySlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_count() {
        let config = DetectorFamilyConfig::siemens_quadra();
        // 3 rings of 7600 crystals
        let table = SlotTable::build_with_count(&config, Granularity::Crystal, 22_800).unwrap();
        assert_eq!(table.len(), 22_800);
        assert_eq!(table.layout().rings(), 3);
    }

    #[test]
    fn test_build_with_count_rejects_bad_counts() {
        let config = DetectorFamilyConfig::siemens_quadra();
        let err = SlotTable::build_with_count(&config, Granularity::Block, 0).unwrap_err();
        assert_eq!(err.as_core(), Some(&CoreError::NonPositiveCount(0)));

        let err = SlotTable::build_with_count(&config, Granularity::Block, -38).unwrap_err();
        assert_eq!(err.as_core(), Some(&CoreError::NonPositiveCount(-38)));

        let err = SlotTable::build_with_count(&config, Granularity::Block, 40).unwrap_err();
        assert_eq!(
            err.as_core(),
            Some(&CoreError::NonIntegralCount {
                count: 40,
                per_ring: 38
            })
        );

        assert!(SlotTable::build_with_count(&config, Granularity::Panel, 76).is_err());
        assert!(SlotTable::build_with_count(&config, Granularity::Panel, 38).is_ok());
    }

    #[test]
    fn test_get_out_of_range() {
        let config = DetectorFamilyConfig::basic();
        let table = SlotTable::build(&config, Granularity::Block).unwrap();
        assert!(table.get(199).is_ok());
        assert!(table.get(200).is_err());
        assert!(!table.contains(200));
    }
}
