//! Compute dispatch sizing.

/// Thread-group edge length of the raymarch kernel (`@workgroup_size(8, 8, 1)`).
pub const WORKGROUP_SIZE: u32 = 8;

/// Compute thread-group counts for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupCount {
    /// Groups along X.
    pub x: u32,
    /// Groups along Y.
    pub y: u32,
    /// Groups along Z (always 1 for screen-space dispatches).
    pub z: u32,
}

impl WorkgroupCount {
    /// Groups covering a `width` × `height` pixel grid with 8×8 groups.
    #[must_use]
    pub const fn for_viewport(width: u32, height: u32) -> Self {
        Self {
            x: width.div_ceil(WORKGROUP_SIZE),
            y: height.div_ceil(WORKGROUP_SIZE),
            z: 1,
        }
    }

    /// Total number of groups.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.x * self.y * self.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hd_viewport() {
        assert_eq!(
            WorkgroupCount::for_viewport(1920, 1080),
            WorkgroupCount { x: 240, y: 135, z: 1 }
        );
    }

    #[test]
    fn partial_groups_round_up() {
        assert_eq!(
            WorkgroupCount::for_viewport(1921, 1),
            WorkgroupCount { x: 241, y: 1, z: 1 }
        );
        assert_eq!(WorkgroupCount::for_viewport(7, 9).total(), 2);
    }

    #[test]
    fn empty_viewport_dispatches_nothing() {
        assert_eq!(WorkgroupCount::for_viewport(0, 0).total(), 0);
    }
}
