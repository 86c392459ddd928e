//! Circular "donut" percentage indicator.
//!
//! Draws a ring with a foreground arc filled to a target percentage and a
//! centered text label, and can animate the fill from a start value up to
//! the target one integer step at a time.

// ============================================================================
// CRATE CONFIGURATION & IMPORTS
// ============================================================================

// External crate imports
use bon::Builder;
use rusttype::{Font, Scale};

// Standard library imports
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// ============================================================================
// COLOR CONFIGURATION
// ============================================================================

/// Color representation for chart elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn as_tuple(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Parses `#rgb` / `#rrggbb` hex notation plus a handful of named
    /// colors. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return match hex.len() {
                3 => {
                    let mut c = [0u8; 3];
                    for (i, ch) in hex.chars().enumerate() {
                        let v = ch.to_digit(16)? as u8;
                        c[i] = v << 4 | v;
                    }
                    Some(Self::new(c[0], c[1], c[2]))
                }
                6 => {
                    let v = u32::from_str_radix(hex, 16).ok()?;
                    Some(Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
                }
                _ => None,
            };
        }
        match s.to_ascii_lowercase().as_str() {
            "red" => Some(Self::new(0xff, 0x00, 0x00)),
            "green" => Some(Self::new(0x00, 0x80, 0x00)),
            "blue" => Some(Self::new(0x00, 0x00, 0xff)),
            "black" => Some(Self::new(0x00, 0x00, 0x00)),
            "white" => Some(Self::new(0xff, 0xff, 0xff)),
            "gray" | "grey" => Some(Self::new(0x80, 0x80, 0x80)),
            _ => None,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised synchronously at the offending call. Nothing is retried or
/// recovered internally; a failed operation leaves the last rendered frame
/// in place.
#[derive(Debug, thiserror::Error)]
pub enum DonutError {
    #[error("start value {0} is not a valid number")]
    InvalidStart(f64),
    #[error("unrecognized method `{0}`")]
    UnknownMethod(String),
    #[error("an animation is already stepping")]
    AnimationInProgress,
    #[error("no drawing surface available: {0}")]
    Backend(String),
}

// ============================================================================
// PUBLIC API - CONFIGURATION
// ============================================================================

/// Chart configuration. Caller overrides are overlaid onto the defaults by
/// the builder; the resolved record is immutable for the lifetime of the
/// widget.
///
/// Geometry is not validated: a `donut_width` larger than `size / 2` yields
/// a degenerate inner radius and fills the whole disc.
#[derive(Debug, Clone, Builder)]
pub struct DonutConfig {
    /// Fill color of the donut background ring.
    #[builder(default = Color::new(0xcc, 0xcc, 0xcc))]
    pub background_color: Color,
    /// Fill color of the filled donut foreground arc.
    #[builder(default = Color::new(0xff, 0x00, 0x00))]
    pub color: Color,
    /// Full height and width of the drawing surface, in pixels.
    #[builder(default = 160)]
    pub size: usize,
    /// Thickness of the ring that makes the donut, in pixels.
    #[builder(default = 40)]
    pub donut_width: usize,
    /// Label font size, in pixels.
    #[builder(default = 16.0)]
    pub font_size: f32,
    /// Whether the widget starts animating from zero right after attachment.
    #[builder(default = true)]
    pub animate: bool,
    /// Delay between animation steps.
    #[builder(default = Duration::from_millis(20))]
    pub step_interval: Duration,
    /// Font used to rasterize the percentage label onto the surface. The
    /// label text is tracked either way; without a font it is just not
    /// drawn.
    pub font_data: Option<Vec<u8>>,
}

impl Default for DonutConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ============================================================================
// HOST ATTACHMENT POINT
// ============================================================================

/// The caller-owned attachment point the widget is bound to. It carries the
/// target percentage, which the widget reads fresh on every operation and
/// every animation tick; the caller may overwrite it at any time, including
/// while an animation is stepping.
#[derive(Debug)]
pub struct Host {
    percent: AtomicI64,
}

impl Host {
    pub fn new(percent: i64) -> Self {
        Self {
            percent: AtomicI64::new(percent),
        }
    }

    pub fn set_percent(&self, percent: i64) {
        self.percent.store(percent, Ordering::Relaxed);
    }

    pub fn percent(&self) -> i64 {
        self.percent.load(Ordering::Relaxed)
    }
}

// ============================================================================
// DRAWING SURFACE & BACKEND
// ============================================================================

/// Owned RGBA8 pixel surface the chart renders into. Pixels are transparent
/// wherever nothing has been drawn.
pub struct Surface {
    width: usize,
    height: usize,
    frame: Vec<u8>,
}

impl Surface {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            frame: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA8 pixel data, row-major.
    pub fn data(&self) -> &[u8] {
        &self.frame
    }

    /// RGBA value of a single pixel.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let idx = (y * self.width + x) * 4;
        [
            self.frame[idx],
            self.frame[idx + 1],
            self.frame[idx + 2],
            self.frame[idx + 3],
        ]
    }

    fn clear(&mut self) {
        self.frame.fill(0);
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Provider of drawing surfaces. Environments without native 2D support can
/// inject their own implementation; `create_surface` is the capability
/// check and refuses with [`DonutError::Backend`] when no surface can be
/// produced.
pub trait SurfaceBackend {
    fn create_surface(&self, width: usize, height: usize) -> Result<Surface, DonutError>;
}

/// Default backend rasterizing into an owned in-memory buffer. Always
/// available.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

impl SurfaceBackend for SoftwareBackend {
    fn create_surface(&self, width: usize, height: usize) -> Result<Surface, DonutError> {
        Ok(Surface::new(width, height))
    }
}

// ============================================================================
// PUBLIC API - MAIN INTERFACE
// ============================================================================

/// The donut chart widget handle. Created by [`DonutChart::attach`]; holds
/// the resolved configuration, the drawing surface, the label text, and the
/// animation state for one host.
#[derive(Debug)]
pub struct DonutChart {
    shared: Arc<ChartShared>,
    worker: Option<JoinHandle<()>>,
}

/// Cancellation token for the widget's animation. Cancelling stops the
/// stepping loop after the frame currently being rendered; the last
/// rendered frame stays displayed. Starting a new animation rearms the
/// token.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct ChartShared {
    config: DonutConfig,
    host: Arc<Host>,
    frame: Mutex<FrameState>,
    // Animation step persisted between runs; resuming without an explicit
    // start value continues from here.
    step: AtomicI64,
    // Single-flight guard: at most one stepping loop per widget.
    stepping: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

#[derive(Debug)]
struct FrameState {
    surface: Surface,
    label: String,
}

impl DonutChart {
    /// Attaches a new donut chart to `host` using the default software
    /// backend. Renders once at the host's current target percentage, or
    /// starts animating from zero when `config.animate` is set.
    pub fn attach(host: Arc<Host>, config: DonutConfig) -> Result<Self, DonutError> {
        Self::attach_with_backend(host, config, &SoftwareBackend)
    }

    /// Attaches using an injected surface backend.
    pub fn attach_with_backend(
        host: Arc<Host>,
        config: DonutConfig,
        backend: &dyn SurfaceBackend,
    ) -> Result<Self, DonutError> {
        let surface = backend.create_surface(config.size, config.size)?;
        log::debug!(
            "attaching donut chart: size={} donut_width={} target={}%",
            config.size,
            config.donut_width,
            host.percent()
        );
        let animate = config.animate;
        let shared = Arc::new(ChartShared {
            config,
            host,
            frame: Mutex::new(FrameState {
                surface,
                label: String::new(),
            }),
            step: AtomicI64::new(0),
            stepping: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
        });
        let mut chart = Self {
            shared,
            worker: None,
        };
        if animate {
            chart.animate(Some(0.0))?;
        } else {
            let target = chart.shared.host.percent();
            chart.shared.render_frame(target);
        }
        Ok(chart)
    }

    /// Renders one frame at `percent`: background ring, foreground arc, and
    /// the `"<percent>%"` label. No clamping is performed; out-of-range
    /// values produce geometrically valid but misleading arcs.
    pub fn fill_to_percentage(&self, percent: i64) {
        self.shared.render_frame(percent);
    }

    /// Steps the displayed percentage up to the host's target value, one
    /// integer unit per `step_interval`, on a worker thread.
    ///
    /// With an explicit `start` the sequence begins there (fractions are
    /// truncated); without one it resumes from the step the previous run
    /// left behind, initially zero. A non-finite `start` is an error, as is
    /// invoking this while a previous run is still stepping.
    pub fn animate(&mut self, start: Option<f64>) -> Result<CancelToken, DonutError> {
        if let Some(value) = start {
            if !value.is_finite() {
                return Err(DonutError::InvalidStart(value));
            }
        }
        if self
            .shared
            .stepping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DonutError::AnimationInProgress);
        }
        // The previous run has finished; reap its thread.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(value) = start {
            self.shared.step.store(value as i64, Ordering::Relaxed);
        }
        self.shared.cancelled.store(false, Ordering::Relaxed);
        log::debug!(
            "animation starting at step {} towards {}%",
            self.shared.step.load(Ordering::Relaxed),
            self.shared.host.percent()
        );
        let shared = Arc::clone(&self.shared);
        self.worker = Some(thread::spawn(move || run_animation(&shared)));
        Ok(self.cancel_token())
    }

    /// Name-based dispatch mirroring the attachment-time entry point. Only
    /// `"animate"` is recognized.
    pub fn invoke(&mut self, method: &str, start: Option<f64>) -> Result<CancelToken, DonutError> {
        match method {
            "animate" => self.animate(start),
            other => Err(DonutError::UnknownMethod(other.to_string())),
        }
    }

    /// Requests cancellation of the in-flight animation, if any.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            cancelled: Arc::clone(&self.shared.cancelled),
        }
    }

    /// Blocks until the current animation run (if any) has finished.
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    pub fn is_animating(&self) -> bool {
        self.shared.stepping.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &DonutConfig {
        &self.shared.config
    }

    /// The step the animator last rendered, persisted between runs.
    pub fn current_step(&self) -> i64 {
        self.shared.step.load(Ordering::Relaxed)
    }

    /// Current text of the percentage label.
    pub fn label_text(&self) -> String {
        lock_frame(&self.shared.frame).label.clone()
    }

    /// Read access to the drawing surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&Surface) -> R) -> R {
        let state = lock_frame(&self.shared.frame);
        f(&state.surface)
    }
}

impl Drop for DonutChart {
    fn drop(&mut self) {
        // Detached widgets stop stepping after their current frame.
        self.cancel();
    }
}

fn lock_frame(frame: &Mutex<FrameState>) -> MutexGuard<'_, FrameState> {
    // A poisoned lock still holds a usable frame.
    frame.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// ANIMATOR
// ============================================================================

impl ChartShared {
    /// One animation tick: render the current step, then compare it against
    /// the target read fresh from the host. Returns the delay before the
    /// next tick, or `None` when the sequence has finished and nothing more
    /// should be scheduled.
    fn animation_tick(&self) -> Option<Duration> {
        let step = self.step.load(Ordering::Relaxed);
        self.render_frame(step);
        let target = self.host.percent();
        if step >= target {
            return None;
        }
        if self.cancelled.load(Ordering::Relaxed) {
            log::debug!("animation cancelled at step {step}");
            return None;
        }
        self.step.store(step + 1, Ordering::Relaxed);
        Some(self.config.step_interval)
    }

    /// Draws one complete frame for `percent` and updates the label.
    fn render_frame(&self, percent: i64) {
        let config = &self.config;
        let mut state = lock_frame(&self.frame);
        let center = config.size as i32 / 2;
        let outer = config.size as f64 / 2.0;
        let ring_width = config.donut_width as f64;

        state.surface.clear();
        fill_annulus(
            &mut state.surface,
            center,
            center,
            outer,
            ring_width,
            config.background_color.as_tuple(),
        );
        let sweep = percent as f64 / 100.0 * 2.0 * PI;
        fill_annulus_sector(
            &mut state.surface,
            center,
            center,
            outer,
            ring_width,
            -FRAC_PI_2,
            sweep,
            config.color.as_tuple(),
        );

        state.label = format!("{percent}%");
        if let Some(font_data) = &config.font_data {
            if let Some(font) = Font::try_from_vec(font_data.clone()) {
                let label = state.label.clone();
                draw_text(
                    &mut state.surface,
                    center,
                    center,
                    &label,
                    &font,
                    Scale::uniform(config.font_size),
                    (0x00, 0x00, 0x00),
                );
            } else {
                log::debug!("label font data did not parse; skipping text");
            }
        }
    }
}

fn run_animation(shared: &ChartShared) {
    while let Some(delay) = shared.animation_tick() {
        thread::sleep(delay);
    }
    shared.stepping.store(false, Ordering::Release);
    log::debug!(
        "animation finished at step {}",
        shared.step.load(Ordering::Relaxed)
    );
}

// ============================================================================
// DRAWING PRIMITIVES
// ============================================================================

fn set_pixel(surface: &mut Surface, x: usize, y: usize, r: u8, g: u8, b: u8, alpha: f32) {
    if x < surface.width && y < surface.height {
        let idx = (y * surface.width + x) * 4;
        let frame = &mut surface.frame;
        // Source-over blend keeping destination alpha, so the surface stays
        // transparent outside the ring.
        let sa = alpha.clamp(0.0, 1.0);
        let da = frame[idx + 3] as f32 / 255.0;
        let oa = sa + da * (1.0 - sa);
        if oa <= 0.0 {
            return;
        }
        let src = [r as f32, g as f32, b as f32];
        for c in 0..3 {
            let dst = frame[idx + c] as f32;
            frame[idx + c] = ((src[c] * sa + dst * da * (1.0 - sa)) / oa).round() as u8;
        }
        frame[idx + 3] = (oa * 255.0).round() as u8;
    }
}

/// Fills the full ring between `outer` and `outer - ring_width` around
/// (`cx`, `cy`), with one pixel of edge anti-aliasing. A `ring_width`
/// beyond `outer` degenerates into a filled disc.
fn fill_annulus(
    surface: &mut Surface,
    cx: i32,
    cy: i32,
    outer: f64,
    ring_width: f64,
    color: (u8, u8, u8),
) {
    let inner = outer - ring_width;
    for y in 0..surface.height as i32 {
        for x in 0..surface.width as i32 {
            let dx = x - cx;
            let dy = y - cy;
            let dist = ((dx * dx + dy * dy) as f64).sqrt();
            if dist > outer + 1.0 || dist < inner - 1.0 {
                continue;
            }
            let aa = if dist > outer {
                1.0 - (dist - outer).min(1.0)
            } else if dist < inner {
                1.0 - (inner - dist).min(1.0)
            } else {
                1.0
            };
            if aa > 0.0 {
                set_pixel(
                    surface,
                    x as usize,
                    y as usize,
                    color.0,
                    color.1,
                    color.2,
                    aa as f32,
                );
            }
        }
    }
}

/// Fills the ring sector starting at `start_angle` and sweeping clockwise
/// by `sweep` radians. Sweeps of a full turn or more fill the whole ring;
/// negative sweeps wrap modulo a full turn, matching 2D-canvas arc
/// semantics.
fn fill_annulus_sector(
    surface: &mut Surface,
    cx: i32,
    cy: i32,
    outer: f64,
    ring_width: f64,
    start_angle: f64,
    sweep: f64,
    color: (u8, u8, u8),
) {
    if sweep >= 2.0 * PI {
        fill_annulus(surface, cx, cy, outer, ring_width, color);
        return;
    }
    let sweep = sweep.rem_euclid(2.0 * PI);
    if sweep == 0.0 {
        return;
    }
    let start = start_angle.rem_euclid(2.0 * PI);
    let end = (start + sweep).rem_euclid(2.0 * PI);
    let inner = outer - ring_width;
    for y in 0..surface.height as i32 {
        for x in 0..surface.width as i32 {
            let dx = x - cx;
            let dy = y - cy;
            let dist = ((dx * dx + dy * dy) as f64).sqrt();
            if dist > outer + 1.0 || dist < inner - 1.0 {
                continue;
            }
            let mut angle = (dy as f64).atan2(dx as f64);
            if angle < 0.0 {
                angle += 2.0 * PI;
            }
            let in_arc = if start <= end {
                angle >= start && angle <= end
            } else {
                angle >= start || angle <= end
            };
            if !in_arc {
                continue;
            }
            let aa = if dist > outer {
                1.0 - (dist - outer).min(1.0)
            } else if dist < inner {
                1.0 - (inner - dist).min(1.0)
            } else {
                1.0
            };
            if aa > 0.0 {
                set_pixel(
                    surface,
                    x as usize,
                    y as usize,
                    color.0,
                    color.1,
                    color.2,
                    aa as f32,
                );
            }
        }
    }
}

fn draw_text(
    surface: &mut Surface,
    x: i32,
    y: i32,
    text: &str,
    font: &Font,
    scale: Scale,
    color: (u8, u8, u8),
) {
    use rusttype::{point, PositionedGlyph};
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<PositionedGlyph> = font
        .layout(text, scale, point(0.0, v_metrics.ascent))
        .collect();
    // Bounding box for the whole string, to center it on (x, y)
    let (min_x, max_x, min_y, max_y) = glyphs.iter().filter_map(|g| g.pixel_bounding_box()).fold(
        (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        |(min_x, max_x, min_y, max_y), bb| {
            (
                min_x.min(bb.min.x),
                max_x.max(bb.max.x),
                min_y.min(bb.min.y),
                max_y.max(bb.max.y),
            )
        },
    );
    let width_px = if min_x < max_x { max_x - min_x } else { 0 };
    let height_px = if min_y < max_y { max_y - min_y } else { 0 };
    let offset_x = x - width_px / 2;
    let offset_y = y - height_px / 2;
    for glyph in glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            let (fw, fh) = (surface.width as i32, surface.height as i32);
            let mut covered = Vec::new();
            glyph.draw(|gx, gy, v| {
                let px = offset_x + gx as i32 + bb.min.x - min_x;
                let py = offset_y + gy as i32 + bb.min.y - min_y;
                if px >= 0 && px < fw && py >= 0 && py < fh {
                    covered.push((px as usize, py as usize, v));
                }
            });
            for (px, py, v) in covered {
                set_pixel(surface, px, py, color.0, color.1, color.2, v);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BG: (u8, u8, u8) = (0xcc, 0xcc, 0xcc);
    const FG: (u8, u8, u8) = (0xff, 0x00, 0x00);

    fn host(percent: i64) -> Arc<Host> {
        Arc::new(Host::new(percent))
    }

    fn static_config() -> DonutConfig {
        DonutConfig::builder()
            .animate(false)
            .step_interval(Duration::from_millis(1))
            .build()
    }

    /// RGBA of the mid-ring pixel at `angle` (radians, screen convention)
    /// on a default-sized chart.
    fn sample_ring(chart: &DonutChart, angle: f64) -> [u8; 4] {
        chart.with_surface(|surface| {
            let c = surface.width() as f64 / 2.0;
            let mid = c - 20.0;
            let x = (c + angle.cos() * mid) as usize;
            let y = (c + angle.sin() * mid) as usize;
            surface.pixel(x, y)
        })
    }

    #[test]
    fn default_configuration() {
        let config = DonutConfig::default();
        assert_eq!(config.background_color, Color::new(0xcc, 0xcc, 0xcc));
        assert_eq!(config.color, Color::new(0xff, 0x00, 0x00));
        assert_eq!(config.size, 160);
        assert_eq!(config.donut_width, 40);
        assert_eq!(config.font_size, 16.0);
        assert!(config.animate);
        assert_eq!(config.step_interval, Duration::from_millis(20));
        assert!(config.font_data.is_none());
    }

    #[test]
    fn builder_overrides_merge_over_defaults() {
        let config = DonutConfig::builder()
            .size(200)
            .donut_width(10)
            .animate(false)
            .build();
        assert_eq!(config.size, 200);
        assert_eq!(config.donut_width, 10);
        assert!(!config.animate);
        // Untouched fields keep their defaults
        assert_eq!(config.color, Color::new(0xff, 0x00, 0x00));
        assert_eq!(config.font_size, 16.0);
    }

    #[test]
    fn color_parsing() {
        assert_eq!(Color::parse("#ccc"), Some(Color::new(0xcc, 0xcc, 0xcc)));
        assert_eq!(Color::parse("#a1b2c3"), Some(Color::new(0xa1, 0xb2, 0xc3)));
        assert_eq!(Color::parse("red"), Some(Color::new(0xff, 0x00, 0x00)));
        assert_eq!(Color::parse("Grey"), Some(Color::new(0x80, 0x80, 0x80)));
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("mauve-ish"), None);
    }

    #[test]
    fn label_matches_percentage() {
        let chart = DonutChart::attach(host(0), static_config()).unwrap();
        chart.fill_to_percentage(63);
        assert_eq!(chart.label_text(), "63%");
        chart.fill_to_percentage(-5);
        assert_eq!(chart.label_text(), "-5%");
    }

    #[test]
    fn attach_without_animation_renders_target_once() {
        let chart = DonutChart::attach(host(37), static_config()).unwrap();
        assert_eq!(chart.label_text(), "37%");
        assert!(!chart.is_animating());
        assert_eq!(chart.current_step(), 0);
    }

    #[test]
    fn foreground_sweep_covers_the_requested_fraction() {
        let chart = DonutChart::attach(host(0), static_config()).unwrap();

        // 25% sweeps from 12 o'clock to 3 o'clock
        chart.fill_to_percentage(25);
        let inside = sample_ring(&chart, -FRAC_PI_2 / 2.0);
        let outside = sample_ring(&chart, FRAC_PI_2 / 2.0);
        assert_eq!(&inside[..3], &[FG.0, FG.1, FG.2]);
        assert_eq!(inside[3], 0xff);
        assert_eq!(&outside[..3], &[BG.0, BG.1, BG.2]);
    }

    #[test]
    fn zero_percent_draws_no_foreground() {
        let chart = DonutChart::attach(host(0), static_config()).unwrap();
        chart.fill_to_percentage(0);
        let fg_pixels = chart.with_surface(|surface| {
            surface
                .data()
                .chunks_exact(4)
                .filter(|p| p[..3] == [FG.0, FG.1, FG.2] && p[3] == 0xff)
                .count()
        });
        assert_eq!(fg_pixels, 0);
        // The background ring itself is present
        assert_eq!(&sample_ring(&chart, 0.0)[..3], &[BG.0, BG.1, BG.2]);
    }

    #[test]
    fn full_percent_fills_the_whole_ring_and_leaves_the_hole() {
        let chart = DonutChart::attach(host(0), static_config()).unwrap();
        chart.fill_to_percentage(100);
        for angle in [0.0, FRAC_PI_2, PI, -FRAC_PI_2 + 0.05, 2.5] {
            assert_eq!(&sample_ring(&chart, angle)[..3], &[FG.0, FG.1, FG.2]);
        }
        // The donut hole stays untouched
        let center = chart.with_surface(|surface| surface.pixel(80, 80));
        assert_eq!(center, [0, 0, 0, 0]);
    }

    #[test]
    fn rendering_is_idempotent() {
        let chart = DonutChart::attach(host(0), static_config()).unwrap();
        chart.fill_to_percentage(42);
        let first = chart.with_surface(|surface| surface.data().to_vec());
        chart.fill_to_percentage(42);
        let second = chart.with_surface(|surface| surface.data().to_vec());
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_ring_width_fills_the_disc() {
        let config = DonutConfig::builder()
            .animate(false)
            .donut_width(120)
            .build();
        let chart = DonutChart::attach(host(0), config).unwrap();
        chart.fill_to_percentage(0);
        let center = chart.with_surface(|surface| surface.pixel(80, 80));
        assert_eq!(&center[..3], &[BG.0, BG.1, BG.2]);
    }

    #[test]
    fn animation_steps_through_every_label() {
        let chart = DonutChart::attach(host(3), static_config()).unwrap();
        let mut labels = Vec::new();
        loop {
            let rearm = chart.shared.animation_tick();
            labels.push(chart.label_text());
            if rearm.is_none() {
                break;
            }
        }
        assert_eq!(labels, ["0%", "1%", "2%", "3%"]);
        // Terminal: a further tick renders the final value again and does
        // not schedule anything
        assert!(chart.shared.animation_tick().is_none());
        assert_eq!(chart.label_text(), "3%");
        assert_eq!(chart.current_step(), 3);
    }

    #[test]
    fn attach_with_animation_runs_to_target() {
        let config = DonutConfig::builder()
            .step_interval(Duration::from_millis(1))
            .build();
        let mut chart = DonutChart::attach(host(3), config).unwrap();
        chart.wait();
        assert_eq!(chart.label_text(), "3%");
        assert_eq!(chart.current_step(), 3);
        assert!(!chart.is_animating());
    }

    #[test]
    fn animate_resumes_from_persisted_step() {
        let host = host(3);
        let mut chart = DonutChart::attach(Arc::clone(&host), static_config()).unwrap();
        chart.animate(None).unwrap();
        chart.wait();
        assert_eq!(chart.current_step(), 3);

        // A later run picks up at step 3, not at zero
        host.set_percent(6);
        chart.animate(None).unwrap();
        chart.wait();
        assert_eq!(chart.current_step(), 6);
        assert_eq!(chart.label_text(), "6%");
    }

    #[test]
    fn explicit_start_truncates_like_an_integer_parse() {
        let mut chart = DonutChart::attach(host(5), static_config()).unwrap();
        chart.animate(Some(3.9)).unwrap();
        chart.wait();
        assert_eq!(chart.current_step(), 5);
        assert_eq!(chart.label_text(), "5%");
    }

    #[test]
    fn non_finite_start_is_rejected_and_leaves_the_frame_alone() {
        let mut chart = DonutChart::attach(host(5), static_config()).unwrap();
        chart.fill_to_percentage(5);
        let before = chart.with_surface(|surface| surface.data().to_vec());
        let err = chart.animate(Some(f64::NAN)).unwrap_err();
        assert!(matches!(err, DonutError::InvalidStart(_)));
        let after = chart.with_surface(|surface| surface.data().to_vec());
        assert_eq!(before, after);
        assert_eq!(chart.label_text(), "5%");
        assert!(!chart.is_animating());
    }

    #[test]
    fn unknown_method_is_rejected() {
        let mut chart = DonutChart::attach(host(5), static_config()).unwrap();
        let err = chart.invoke("explode", None).unwrap_err();
        assert!(matches!(err, DonutError::UnknownMethod(name) if name == "explode"));
    }

    #[test]
    fn concurrent_animation_is_rejected_and_cancellable() {
        let config = DonutConfig::builder()
            .animate(false)
            .step_interval(Duration::from_millis(25))
            .build();
        let mut chart = DonutChart::attach(host(100), config).unwrap();
        let token = chart.animate(Some(0.0)).unwrap();
        assert!(matches!(
            chart.animate(None).unwrap_err(),
            DonutError::AnimationInProgress
        ));
        token.cancel();
        assert!(token.is_cancelled());
        chart.wait();
        assert!(!chart.is_animating());
        assert!(chart.current_step() < 100);
    }

    #[test]
    fn refusing_backend_fails_attachment() {
        struct NoSurface;
        impl SurfaceBackend for NoSurface {
            fn create_surface(&self, _: usize, _: usize) -> Result<Surface, DonutError> {
                Err(DonutError::Backend("2D rendering not supported".into()))
            }
        }
        let err =
            DonutChart::attach_with_backend(host(5), static_config(), &NoSurface).unwrap_err();
        assert!(matches!(err, DonutError::Backend(_)));
    }
}
