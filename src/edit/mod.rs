//! Edit cache and guidance-input compositing.
//!
//! Everything between "the renderer produced a refined patch" and "the
//! guidance model returned an edited image we can supervise on" lives here:
//! - `cache`: per-frame edited targets with a persisted manifest
//! - `compositor`: blending refined renders with ground truth for guidance

mod cache;
mod compositor;

pub use cache::{CacheError, EditCache, EditCacheEntry, EditPolicy};
pub use compositor::{composite, resize_mask, resize_rgb, GuidanceInput};
