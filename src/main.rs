use donutchart::{Color, DonutChart, DonutConfig, Host};
use pixels::{Pixels, SurfaceTexture};
use rand::Rng;
use std::env;
use std::sync::Arc;
use std::time::Instant;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

/// Font files commonly present on desktop systems, tried in order for the
/// percentage label.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn load_system_font() -> Option<Vec<u8>> {
    for path in FONT_CANDIDATES {
        if let Ok(data) = std::fs::read(path) {
            if rusttype::Font::try_from_vec(data.clone()).is_some() {
                log::debug!("label font: {path}");
                return Some(data);
            }
        }
    }
    log::warn!("no usable system font found; the percentage label will not be drawn");
    None
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Parse --percent n, --size n, --title s, --color c, --background c,
    // --no-animate from the command line
    let mut percent: Option<i64> = None;
    let mut size: usize = 160;
    let mut window_title = "Donut Chart".to_string();
    let mut color: Option<Color> = None;
    let mut background: Option<Color> = None;
    let mut animate = true;
    let mut args = env::args().peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--percent" => {
                if let Some(value) = args.next() {
                    if let Ok(value) = value.parse::<i64>() {
                        percent = Some(value);
                    }
                }
            }
            "--size" => {
                if let Some(value) = args.next() {
                    if let Ok(value) = value.parse::<usize>() {
                        size = value;
                    }
                }
            }
            "--title" => {
                if let Some(title) = args.next() {
                    window_title = title;
                }
            }
            "--color" => {
                if let Some(value) = args.next() {
                    color = Color::parse(&value);
                }
            }
            "--background" => {
                if let Some(value) = args.next() {
                    background = Color::parse(&value);
                }
            }
            "--no-animate" => {
                animate = false;
            }
            _ => {}
        }
    }

    // Without an explicit target, pick one at random
    let percent = percent.unwrap_or_else(|| rand::rng().random_range(5..=100));
    log::info!("donut chart target: {percent}%");

    let host = Arc::new(Host::new(percent));
    let config = DonutConfig::builder()
        .size(size)
        .animate(animate)
        .maybe_color(color)
        .maybe_background_color(background)
        .maybe_font_data(load_system_font())
        .build();
    let chart = DonutChart::attach(Arc::clone(&host), config)?;

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title(&window_title)
        .with_inner_size(LogicalSize::new(size as f64, size as f64))
        .with_resizable(false)
        .build(&event_loop)?;
    let window = Arc::new(window);
    let window_clone = window.clone();

    let fb_size = window.inner_size();
    let mut fb_width = fb_size.width as usize;
    let mut fb_height = fb_size.height as usize;
    let surface_texture = SurfaceTexture::new(fb_size.width, fb_size.height, &window);
    let mut pixels = Pixels::new(fb_size.width, fb_size.height, surface_texture)?;

    let target_fps = 60.0;
    let frame_duration = std::time::Duration::from_secs_f64(1.0 / target_fps);
    let mut last_frame = Instant::now();

    event_loop.run(move |event, window_target| {
        window_target.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    chart.cancel();
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    fb_width = new_size.width as usize;
                    fb_height = new_size.height as usize;
                    let _ = pixels.resize_buffer(new_size.width, new_size.height);
                    let _ = pixels.resize_surface(new_size.width, new_size.height);
                }
                WindowEvent::RedrawRequested => {
                    blit_chart(pixels.frame_mut(), fb_width, fb_height, &chart);
                    let _ = pixels.render();
                }
                _ => {}
            },
            Event::AboutToWait => {
                // Limit redraws to the target frame rate
                let elapsed = last_frame.elapsed();
                if elapsed < frame_duration {
                    std::thread::sleep(frame_duration - elapsed);
                }
                last_frame = Instant::now();
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}

/// Composites the chart surface over a white background into the window
/// framebuffer.
fn blit_chart(frame: &mut [u8], fb_width: usize, fb_height: usize, chart: &DonutChart) {
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&[0xff, 0xff, 0xff, 0xff]);
    }
    chart.with_surface(|surface| {
        let data = surface.data();
        for y in 0..surface.height().min(fb_height) {
            for x in 0..surface.width().min(fb_width) {
                let src = (y * surface.width() + x) * 4;
                let dst = (y * fb_width + x) * 4;
                let alpha = data[src + 3] as f32 / 255.0;
                for c in 0..3 {
                    let blended =
                        data[src + c] as f32 * alpha + frame[dst + c] as f32 * (1.0 - alpha);
                    frame[dst + c] = blended.round() as u8;
                }
            }
        }
    });
}
