use crate::engine::grain::GrainPool;

// -------------------------------------------------------------------------------------------------

impl GrainPool {
    /// Advance all active grains by one frame and return their summed stereo output.
    ///
    /// Grains which reached their end get retired. When no grains are left playing, a pending
    /// grain limit change gets applied.
    #[inline]
    pub fn advance(&mut self) -> (f32, f32) {
        let mut output = (0.0, 0.0);
        let mut retired = false;
        for &slot in &self.active_slots {
            let grain = &mut self.grains[slot];
            if let Some((left, right)) = grain.next_frame() {
                output.0 += left;
                output.1 += right;
            }
            if grain.is_finished() {
                grain.deactivate();
                retired = true;
            }
        }
        if retired {
            let grains = &self.grains;
            self.active_slots.retain(|&slot| grains[slot].is_active());
        }
        if self.active_slots.is_empty() {
            self.limits.apply_pending();
        }
        output
    }
}

// -------------------------------------------------------------------------------------------------
