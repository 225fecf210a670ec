//! One confidence meter per class.
//!
use anyhow::{bail, Result};
use common::ui::BarView;

#[derive(Debug, Default)]
pub struct BarRenderer {
    bars: Vec<BarView>,
}

impl BarRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[BarView] {
        &self.bars
    }

    /// Make sure exactly `count` bars exist.
    ///
    /// Existing bars are kept when the count already matches; otherwise all bars are replaced
    /// by placeholders.
    pub fn ensure_bars(&mut self, count: usize) {
        if self.bars.len() != count {
            self.bars = vec![BarView::default(); count];
        }
    }

    /// Show `probability` for `label` on the bar at `idx`.
    pub fn update_bar(&mut self, idx: usize, label: &str, probability: f32) -> Result<()> {
        let Some(bar) = self.bars.get_mut(idx) else {
            bail!("no bar {} ({} bars)", idx, self.bars.len());
        };

        bar.label.clear();
        bar.label.push_str(label);
        bar.pct = format!("{probability:.2}");
        bar.fill = (probability * 100.0).round().clamp(0.0, 100.0) as u8;

        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn ensure_bars_matches_count() {
        let mut renderer = BarRenderer::new();
        assert!(renderer.is_empty());

        renderer.ensure_bars(3);
        assert_eq!(renderer.len(), 3);
        assert!(renderer.bars().iter().all(|bar| *bar == BarView::default()));

        renderer.ensure_bars(2);
        assert_eq!(renderer.len(), 2);
    }

    #[test]
    fn ensure_bars_keeps_matching_bars() -> Result<()> {
        let mut renderer = BarRenderer::new();
        renderer.ensure_bars(2);
        renderer.update_bar(1, "glass", 0.3)?;

        renderer.ensure_bars(2);

        assert_eq!(renderer.bars()[1].label, "glass");
        Ok(())
    }

    #[test]
    fn update_bar_formats_probability() -> Result<()> {
        let mut renderer = BarRenderer::new();
        renderer.ensure_bars(2);

        renderer.update_bar(0, "Recyclable", 0.876)?;
        renderer.update_bar(1, "Not recyclable", 0.124)?;

        let bars = renderer.bars();
        assert_eq!(bars[0].label, "Recyclable");
        assert_eq!(bars[0].pct, "0.88");
        assert_eq!(bars[0].fill, 88);
        assert_eq!(bars[1].pct, "0.12");
        assert_eq!(bars[1].fill, 12);
        Ok(())
    }

    #[test]
    fn update_out_of_range_fails() {
        let mut renderer = BarRenderer::new();
        renderer.ensure_bars(1);

        assert!(renderer.update_bar(1, "x", 1.0).is_err());
        assert_eq!(renderer.bars()[0], BarView::default());
    }
}
