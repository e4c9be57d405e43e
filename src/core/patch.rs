//! Patch selection.
//!
//! Editing and refinement are restricted to a fixed-size square sub-region of
//! each frame. The selector centers that square on the frame's bounding box
//! when one is present, otherwise on the frame itself, and clamps the
//! top-left corner so the patch always lies fully inside the frame.
//!
//! Selection is deterministic: same inputs, same patch. The clamp makes the
//! in-bounds property an invariant, so downstream crop and splice code does
//! no bounds checking of its own.

/// A square crop: top-left corner plus side length, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl PatchRect {
    /// Exclusive right edge.
    pub fn x_end(&self) -> u32 {
        self.x + self.size
    }

    /// Exclusive bottom edge.
    pub fn y_end(&self) -> u32 {
        self.y + self.size
    }
}

/// Pick the patch for a frame of `width` x `height` pixels.
///
/// With a bounding box `[x1, y1, x2, y2]` the patch is centered on the box
/// center and the top-left corner clamped into `[0, W-S-1] x [0, H-S-1]`
/// (one-pixel margin preserved where the frame has room; a patch filling a
/// whole dimension pins to 0). Without a box the patch is centered on the
/// frame.
///
/// Requires `size <= min(width, height)`; the clamp then guarantees
/// `0 <= x <= W-S` and `0 <= y <= H-S`.
pub fn select_patch(width: u32, height: u32, size: u32, bbox: Option<[f32; 4]>) -> PatchRect {
    debug_assert!(size <= width && size <= height);

    let (x, y) = match bbox {
        Some([x1, y1, x2, y2]) => {
            let center_x = (x1 + x2) / 2.0;
            let center_y = (y1 + y2) / 2.0;
            let half = (size / 2) as f32;
            // Saturating: a patch filling the whole frame clamps to 0.
            let max_x = (width - size).saturating_sub(1) as f32;
            let max_y = (height - size).saturating_sub(1) as f32;
            (
                (center_x - half).clamp(0.0, max_x) as u32,
                (center_y - half).clamp(0.0, max_y) as u32,
            )
        }
        None => (width / 2 - size / 2, height / 2 - size / 2),
    };

    PatchRect { x, y, size }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_near_corner_clamps_to_zero() {
        // 800x800 frame, 512 patch, bbox centered at (200, 200):
        // 200 - 256 = -56 clamps to 0.
        let p = select_patch(800, 800, 512, Some([100.0, 100.0, 300.0, 300.0]));
        assert_eq!(p, PatchRect { x: 0, y: 0, size: 512 });
    }

    #[test]
    fn test_bbox_near_far_edge_clamps_to_margin() {
        let p = select_patch(800, 800, 512, Some([700.0, 700.0, 790.0, 790.0]));
        // W - S - 1 = 287
        assert_eq!(p.x, 287);
        assert_eq!(p.y, 287);
    }

    #[test]
    fn test_no_bbox_centers_on_frame() {
        let p = select_patch(800, 600, 512, None);
        assert_eq!(p.x, 400 - 256);
        assert_eq!(p.y, 300 - 256);
    }

    #[test]
    fn test_patch_always_inside_frame() {
        let boxes = [
            [-50.0, -50.0, 10.0, 10.0],
            [0.0, 0.0, 639.0, 479.0],
            [600.0, 400.0, 700.0, 500.0],
            [320.0, 240.0, 320.0, 240.0],
        ];
        // Includes the boundary size S = min(W, H).
        for s in [256u32, 480] {
            for bbox in boxes {
                let p = select_patch(640, 480, s, Some(bbox));
                assert!(p.x <= 640 - s, "x={} out of range for {:?}", p.x, bbox);
                assert!(p.y <= 480 - s, "y={} out of range for {:?}", p.y, bbox);
            }
        }
    }

    #[test]
    fn test_patch_filling_whole_frame_pins_to_origin() {
        let p = select_patch(512, 512, 512, Some([100.0, 100.0, 300.0, 300.0]));
        assert_eq!(p, PatchRect { x: 0, y: 0, size: 512 });

        let p = select_patch(512, 512, 512, None);
        assert_eq!((p.x, p.y), (0, 0));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let bbox = Some([12.0, 34.0, 56.0, 78.0]);
        assert_eq!(
            select_patch(800, 800, 512, bbox),
            select_patch(800, 800, 512, bbox)
        );
    }
}
