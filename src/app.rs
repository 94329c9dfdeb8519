use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use pixels::{Pixels, SurfaceTexture};
use tiny_skia::Pixmap;
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::config::KEY_ENTER;
use crate::response::KeyCode;
use crate::results;
use crate::renderer::ScreenRenderer;
use crate::session::{Session, SessionEvent};
use crate::timer::HighPrecisionTimer;

/// Full-screen presentation host for one session.
pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<ScreenRenderer>,
    canvas: Option<Pixmap>,
    session: Session,
    timer: HighPrecisionTimer,
    output: PathBuf,
    exported: bool,
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(session: Session, output: PathBuf) -> Self {
        Self {
            window: None,
            pixels: None,
            renderer: None,
            canvas: None,
            session,
            timer: HighPrecisionTimer::new(),
            output,
            exported: false,
            failure: None,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "Starting presentation; press ESC to abort"
        );
        event_loop.run_app(&mut self)?;

        // aborted sessions still keep what was recorded
        self.export();
        if let Some(stats) = self.timer.frame_stats() {
            info!(
                frames = stats.samples,
                mean_ms = stats.average_frame_time_ns / 1e6,
                jitter_ms = stats.jitter_ns / 1e6,
                fps = stats.effective_fps,
                "Display timing"
            );
        }
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        let attributes = Window::default_attributes()
            .with_title("Delay discounting")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = ?monitor.refresh_rate_millihertz().map(|mhz| mhz as f64 / 1000.0),
            "Display configured"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.canvas = Pixmap::new(size.width, size.height);
        self.renderer = Some(ScreenRenderer::new(
            size.width,
            size.height,
            self.session.config(),
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        let events = self.session.start(self.timer.now_ns())?;
        self.dispatch(events);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer), Some(canvas)) =
            (&mut self.pixels, &mut self.renderer, &mut self.canvas)
        else {
            return Ok(());
        };
        let started = Instant::now();

        renderer.render_frame(
            canvas,
            &self.session.view(),
            self.session.config(),
            self.session.progress(),
        )?;
        if !blit(pixels.frame_mut(), canvas.data()) {
            warn!(
                frame = pixels.frame().len(),
                canvas = canvas.data().len(),
                "Frame and canvas sizes differ; frame skipped"
            );
            return Ok(());
        }
        pixels.render()?;

        self.timer.record_frame_time(started.elapsed());
        Ok(())
    }

    fn update(&mut self) {
        let events = self.session.update(self.timer.now_ns());
        self.dispatch(events);
    }

    fn handle_input(&mut self, key: &Key, event_loop: &ActiveEventLoop) {
        if *key == Key::Named(NamedKey::Escape) {
            if !self.session.is_finished() {
                warn!("Session aborted");
            }
            self.cleanup_and_exit(event_loop);
            return;
        }
        if let Some(key) = key_code(key) {
            let events = self.session.handle_key(key, self.timer.now_ns());
            self.dispatch(events);
        }
    }

    fn dispatch(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            if event == SessionEvent::Finished {
                self.export();
            }
        }
    }

    fn export(&mut self) {
        if self.exported || !self.session.is_started() {
            return;
        }
        match results::write_json(&self.output, &self.session.record()) {
            Ok(()) => {
                self.exported = true;
                info!(path = %self.output.display(), "Results saved");
            }
            Err(e) => error!("{:#}", e),
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                error!("Failed to resize surface: {}", e);
            }
            // the canvas must keep matching the buffer
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                error!("Failed to resize buffer: {}", e);
                return;
            }
        }
        self.canvas = Pixmap::new(size.width, size.height);
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(size.width, size.height);
        }
        info!(width = size.width, height = size.height, "Display resized");
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{:#}", e);
        self.failure = Some(e);
        self.cleanup_and_exit(event_loop);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        event_loop.exit();
    }
}

/// Copies the rendered canvas into the surface frame. Returns `false` and
/// leaves the frame untouched when the sizes differ.
fn blit(frame: &mut [u8], canvas: &[u8]) -> bool {
    if frame.len() != canvas.len() {
        return false;
    }
    frame.copy_from_slice(canvas);
    true
}

/// Host key to the codes the session understands: uppercase ASCII for
/// letters and digits, 13 for Enter.
fn key_code(key: &Key) -> Option<KeyCode> {
    match key {
        Key::Named(NamedKey::Enter) => Some(KEY_ENTER),
        Key::Character(text) => text
            .chars()
            .next()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase() as KeyCode),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e);
                    return;
                }
                self.update();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_input(&event.logical_key, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{KEY_P, KEY_Q};

    #[test]
    fn maps_choice_and_continue_keys() {
        assert_eq!(key_code(&Key::Character("q".into())), Some(KEY_Q));
        assert_eq!(key_code(&Key::Character("P".into())), Some(KEY_P));
        assert_eq!(key_code(&Key::Named(NamedKey::Enter)), Some(KEY_ENTER));
        assert_eq!(key_code(&Key::Named(NamedKey::Space)), None);
        assert_eq!(key_code(&Key::Character("€".into())), None);
    }

    #[test]
    fn mismatched_canvas_is_not_copied() {
        let canvas = Pixmap::new(2, 2).unwrap();
        let mut frame = vec![7u8; 4 * 3 * 3];
        assert!(!blit(&mut frame, canvas.data()));
        assert!(frame.iter().all(|&b| b == 7));

        let mut frame = vec![7u8; 4 * 2 * 2];
        assert!(blit(&mut frame, canvas.data()));
        assert!(frame.iter().all(|&b| b == 0));
    }
}
