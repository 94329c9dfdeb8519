use std::collections::HashMap;
use std::path::Path;

use ab_glyph::{point, Font, FontVec, Glyph, GlyphId, PxScale, PxScaleFont, ScaleFont};
use anyhow::{anyhow, Context, Result};
use tiny_skia::{
    Color, ColorU8, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8,
    Stroke, Transform,
};
use tracing::{debug, warn};

use crate::config::ExperimentConfig;
use crate::session::ScreenView;
use crate::timeline::{decision_text, FeedbackKind};
use crate::trial::Trial;

const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const TRIAL_START_ASSET: &str = "trialStart.jpg";
const JITTER_ASSET: &str = "jitter.jpg";

/// Draws one [`ScreenView`] per frame into a pixmap.
pub struct ScreenRenderer {
    width: u32,
    height: u32,
    center_x: f32,
    center_y: f32,
    font: FontVec,
    glyph_cache: HashMap<GlyphCacheKey, CachedGlyph>,
    /// `None` marks an asset that is missing or unreadable; the vector
    /// fallback is drawn instead.
    images: HashMap<&'static str, Option<Pixmap>>,
}

#[derive(Clone)]
struct CachedGlyph {
    bitmap: Vec<u8>,
    width: u32,
    height: u32,
    bearing_x: i32,
    bearing_y: i32,
}

#[derive(Hash, Eq, PartialEq, Clone, Copy)]
struct GlyphCacheKey {
    glyph_id: u16,
    scale_bits: u32,
}

impl ScreenRenderer {
    pub fn new(width: u32, height: u32, config: &ExperimentConfig) -> Result<Self> {
        let font = load_font(config.font_path.as_deref())?;

        let mut images = HashMap::new();
        for name in [
            TRIAL_START_ASSET,
            JITTER_ASSET,
            FeedbackKind::ChoiceMade.asset_name(),
            FeedbackKind::NoChoice.asset_name(),
        ] {
            images.insert(name, load_image(&config.asset(name)));
        }

        Ok(Self {
            width,
            height,
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            font,
            glyph_cache: HashMap::with_capacity(256),
            images,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.center_x = width as f32 / 2.0;
        self.center_y = height as f32 / 2.0;
    }

    pub fn render_frame(
        &mut self,
        pixmap: &mut Pixmap,
        view: &ScreenView<'_>,
        config: &ExperimentConfig,
        progress: (usize, usize),
    ) -> Result<()> {
        pixmap.fill(Color::BLACK);

        match view {
            ScreenView::Waiting => {}
            ScreenView::Instruction(instruction) => {
                let text = instruction.text(config);
                self.draw_paragraph(pixmap, &text, 24.0, Color::WHITE)?;
            }
            ScreenView::Fixation => {
                if !self.draw_image(pixmap, TRIAL_START_ASSET) {
                    self.render_fixation_cross(pixmap)?;
                }
            }
            ScreenView::Decision(trial) => {
                self.render_decision(pixmap, trial, config)?;
                self.render_progress(pixmap, progress)?;
            }
            ScreenView::Jitter => {
                if !self.draw_image(pixmap, JITTER_ASSET) {
                    self.render_fixation_cross(pixmap)?;
                }
            }
            ScreenView::Feedback(kind) => {
                if !self.draw_image(pixmap, kind.asset_name()) {
                    self.render_feedback(pixmap, *kind)?;
                }
            }
            ScreenView::Summary(text) => {
                self.draw_centered(pixmap, text, self.center_y - 20.0, 28.0, Color::WHITE)?;
                self.draw_centered(
                    pixmap,
                    "Press ESC to exit",
                    self.center_y + 40.0,
                    14.0,
                    Color::from_rgba8(150, 150, 150, 255),
                )?;
            }
        }

        Ok(())
    }

    fn render_decision(
        &mut self,
        pixmap: &mut Pixmap,
        trial: &Trial,
        config: &ExperimentConfig,
    ) -> Result<()> {
        let lines = decision_text(trial, config);
        let line_height = 36.0;
        let top = self.center_y - line_height * lines.len() as f32 / 2.0;

        for (i, line) in lines.iter().enumerate() {
            // amount and delay are the option itself; make them stand out
            let (size, color) = match i {
                3 | 4 => (32.0, Color::WHITE),
                5 => (22.0, Color::from_rgba8(255, 255, 0, 255)),
                _ => (20.0, Color::from_rgba8(200, 200, 200, 255)),
            };
            self.draw_centered(pixmap, line, top + line_height * i as f32, size, color)?;
        }
        Ok(())
    }

    fn render_fixation_cross(&self, pixmap: &mut Pixmap) -> Result<()> {
        let mut paint = Paint::default();
        paint.set_color(Color::WHITE);
        paint.anti_alias = true;

        let arm = 20.0;
        let mut path = PathBuilder::new();
        path.move_to(self.center_x - arm, self.center_y);
        path.line_to(self.center_x + arm, self.center_y);
        path.move_to(self.center_x, self.center_y - arm);
        path.line_to(self.center_x, self.center_y + arm);
        let cross = path
            .finish()
            .ok_or_else(|| anyhow!("Empty fixation cross path"))?;

        let stroke = Stroke {
            width: 2.0,
            ..Default::default()
        };
        pixmap.stroke_path(&cross, &paint, &stroke, Transform::identity(), None);
        Ok(())
    }

    fn render_feedback(&mut self, pixmap: &mut Pixmap, kind: FeedbackKind) -> Result<()> {
        let (text, color) = match kind {
            FeedbackKind::ChoiceMade => ("Choice recorded", Color::from_rgba8(0, 255, 0, 255)),
            FeedbackKind::NoChoice => ("No choice made", Color::from_rgba8(255, 0, 0, 255)),
        };
        self.draw_centered(pixmap, text, self.center_y, 24.0, color)
    }

    fn render_progress(
        &mut self,
        pixmap: &mut Pixmap,
        (done, total): (usize, usize),
    ) -> Result<()> {
        let text = format!("Trial: {}/{}", done, total);
        self.draw_text(
            pixmap,
            &text,
            50.0,
            30.0,
            14.0,
            Color::from_rgba8(150, 150, 150, 255),
        )
    }

    /// Blits a loaded asset centered on screen. False when it is unavailable.
    fn draw_image(&self, pixmap: &mut Pixmap, name: &str) -> bool {
        let Some(Some(image)) = self.images.get(name) else {
            return false;
        };
        let x = (self.width as i32 - image.width() as i32) / 2;
        let y = (self.height as i32 - image.height() as i32) / 2;
        pixmap.draw_pixmap(
            x,
            y,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        true
    }

    /// Word-wraps to 80% of the screen width and centers the block.
    fn draw_paragraph(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        size: f32,
        color: Color,
    ) -> Result<()> {
        let max_width = self.width as f32 * 0.8;
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if !current.is_empty() && self.text_width(&candidate, size) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }

        let line_height = size * 1.5;
        let top = self.center_y - line_height * lines.len() as f32 / 2.0;
        for (i, line) in lines.iter().enumerate() {
            self.draw_centered(pixmap, line, top + line_height * i as f32, size, color)?;
        }
        Ok(())
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let gid = self.font.glyph_id(ch);
            if let Some(p) = prev {
                width += scaled.kern(p, gid);
            }
            width += scaled.h_advance(gid);
            prev = Some(gid);
        }
        width
    }

    fn draw_centered(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        baseline_y: f32,
        size: f32,
        color: Color,
    ) -> Result<()> {
        let x = self.center_x - self.text_width(text, size) / 2.0;
        self.draw_text(pixmap, text, x, baseline_y, size, color)
    }

    fn draw_text(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        baseline_y: f32,
        size: f32,
        color: Color,
    ) -> Result<()> {
        let scale = PxScale::from(size);

        // layout first, noting glyphs not yet rasterized
        let (glyphs, misses) = {
            let scaled_font = self.font.as_scaled(scale);
            let mut pen_x = x;
            let mut prev = None;
            let mut glyphs = Vec::with_capacity(text.len());
            let mut misses = Vec::new();

            for ch in text.chars() {
                let gid = self.font.glyph_id(ch);
                if let Some(prev_gid) = prev {
                    pen_x += scaled_font.kern(prev_gid, gid);
                }
                let key = GlyphCacheKey {
                    glyph_id: gid.0,
                    scale_bits: size.to_bits(),
                };
                if !self.glyph_cache.contains_key(&key) {
                    misses.push((gid, key));
                }
                glyphs.push((point(pen_x, baseline_y), key));
                pen_x += scaled_font.h_advance(gid);
                prev = Some(gid);
            }
            (glyphs, misses)
        };

        if !misses.is_empty() {
            let scaled_font = self.font.as_scaled(scale);
            for (gid, key) in misses {
                let glyph = gid.with_scale_and_position(scale, point(0.0, 0.0));
                rasterize_glyph(&mut self.glyph_cache, &scaled_font, glyph, key);
            }
        }

        let width = pixmap.width();
        let height = pixmap.height();
        let pixels = pixmap.pixels_mut();
        let color = color.to_color_u8();
        for (origin, key) in glyphs {
            if let Some(cached) = self.glyph_cache.get(&key) {
                blend_glyph(pixels, width, height, origin, cached, color);
            }
        }
        Ok(())
    }
}

fn rasterize_glyph(
    cache: &mut HashMap<GlyphCacheKey, CachedGlyph>,
    scaled_font: &PxScaleFont<&FontVec>,
    glyph: Glyph,
    key: GlyphCacheKey,
) {
    let Some(outlined) = scaled_font.outline_glyph(glyph) else {
        return;
    };
    let bounds = outlined.px_bounds();
    let w = bounds.width().ceil() as u32;
    let h = bounds.height().ceil() as u32;
    if w == 0 || h == 0 {
        return;
    }
    let mut bitmap = vec![0u8; (w * h) as usize];
    outlined.draw(|x, y, coverage| {
        if x < w && y < h {
            bitmap[(y * w + x) as usize] = (coverage * 255.0) as u8;
        }
    });
    cache.insert(
        key,
        CachedGlyph {
            bitmap,
            width: w,
            height: h,
            bearing_x: bounds.min.x.floor() as i32,
            bearing_y: bounds.min.y.floor() as i32,
        },
    );
}

/// Source-over blend of a coverage bitmap in premultiplied space.
fn blend_glyph(
    pixels: &mut [PremultipliedColorU8],
    width: u32,
    height: u32,
    origin: ab_glyph::Point,
    cached: &CachedGlyph,
    color: ColorU8,
) {
    let gx0 = origin.x as i32 + cached.bearing_x;
    let gy0 = origin.y as i32 + cached.bearing_y;
    let (r, g, b) = (
        color.red() as f32 / 255.0,
        color.green() as f32 / 255.0,
        color.blue() as f32 / 255.0,
    );
    let a = color.alpha() as f32 / 255.0;

    for gy in 0..cached.height as i32 {
        let py = gy0 + gy;
        if py < 0 || py >= height as i32 {
            continue;
        }
        for gx in 0..cached.width as i32 {
            let px = gx0 + gx;
            if px < 0 || px >= width as i32 {
                continue;
            }
            let coverage = cached.bitmap[(gy as u32 * cached.width + gx as u32) as usize];
            if coverage == 0 {
                continue;
            }
            let alpha = a * coverage as f32 / 255.0;
            let idx = (py as u32 * width + px as u32) as usize;
            let dst = pixels[idx];
            let inv = 1.0 - alpha;
            let out_a = (alpha * 255.0 + dst.alpha() as f32 * inv) as u8;
            let channel =
                |src: f32, dst: u8| ((src * alpha * 255.0 + dst as f32 * inv) as u8).min(out_a);
            if let Some(out) = PremultipliedColorU8::from_rgba(
                channel(r, dst.red()),
                channel(g, dst.green()),
                channel(b, dst.blue()),
                out_a,
            ) {
                pixels[idx] = out;
            }
        }
    }
}

/// Loads an image asset as a premultiplied pixmap.
fn load_image(path: &Path) -> Option<Pixmap> {
    if !path.exists() {
        debug!(path = %path.display(), "Screen asset not found, using fallback");
        return None;
    }
    let rgba = match image::open(path) {
        Ok(img) => img.into_rgba8(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot decode screen asset");
            return None;
        }
    };
    let (w, h) = rgba.dimensions();
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, IntSize::from_wh(w, h)?)
}

/// Reads the configured font, or the bundled DejaVu Sans when none is set.
fn load_font(path: Option<&Path>) -> Result<FontVec> {
    let Some(path) = path else {
        return FontVec::try_from_vec(BUNDLED_FONT.to_vec())
            .map_err(|e| anyhow!("Invalid bundled font: {}", e));
    };
    let bytes =
        std::fs::read(path).with_context(|| format!("Cannot read font {}", path.display()))?;
    debug!(path = %path.display(), "Loaded font");
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("Invalid font {}: {}", path.display(), e))
}
