//! SDL2 Window Display Module
//! Reference consumer: shows the latest camera frame in an SDL2 window and
//! keeps the sensor cache warm. Polls both streams once per tick.

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use tracing::{debug, info};

use crate::capture::frame::{ChannelOrder, Frame};
use crate::pipeline::ShutdownToken;
use crate::stream::{CameraStream, SensorBus};
use crate::transport::MessageSource;

const IDLE_TICK: Duration = Duration::from_millis(5);

/// SDL2 Window Display
/// Scales each frame to the window; vsync paces presentation.
pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    title: String,
}

impl Sdl2Display {
    pub fn new(sdl_context: &sdl2::Sdl, width: u32, height: u32) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window("Avatar Link", width, height)
            .position_centered()
            .resizable()
            .build()?;

        let canvas = window.into_canvas().present_vsync().build()?;
        let texture_creator = canvas.texture_creator();

        Ok(Self {
            canvas,
            texture_creator,
            title: String::new(),
        })
    }

    pub fn render_frame(&mut self, frame: &Frame) -> Result<()> {
        let format = match frame.order() {
            ChannelOrder::Rgb => PixelFormatEnum::RGB24,
            ChannelOrder::Bgr => PixelFormatEnum::BGR24,
        };

        let mut texture = self
            .texture_creator
            .create_texture_streaming(format, frame.width(), frame.height())
            .map_err(|e| eyre!(e))?;

        texture
            .update(None, &frame.data, frame.stride())
            .map_err(|e| eyre!(e))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;

        self.canvas.present();
        Ok(())
    }

    fn set_title(&mut self, title: String) -> Result<()> {
        if title != self.title {
            self.canvas.window_mut().set_title(&title)?;
            self.title = title;
        }
        Ok(())
    }

    pub fn run<C, S>(
        &mut self,
        sdl_context: &sdl2::Sdl,
        camera: &mut CameraStream<C>,
        sensors: &mut SensorBus<S>,
        shutdown: &ShutdownToken,
    ) -> Result<()>
    where
        C: MessageSource,
        S: MessageSource,
    {
        let mut event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;

        'running: while !shutdown.is_cancelled() {
            for event in event_pump.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => {
                        info!("Quit event received");
                        break 'running;
                    }
                    _ => {}
                }
            }

            let updates = sensors.poll_batch();
            if updates > 0 {
                debug!("{} sensor updates, topics: {:?}", updates, sensors.topics().collect::<Vec<_>>());
            }

            if camera.poll() {
                if let Some(frame) = camera.latest_frame() {
                    self.render_frame(&frame)?;
                    self.set_title(format!("Avatar Link - Video {}x{}", frame.width(), frame.height()))?;
                }
            } else {
                if camera.latest_frame().is_none() {
                    self.set_title("Avatar Link - Waiting for video…".into())?;
                }
                std::thread::sleep(IDLE_TICK);
            }
        }

        Ok(())
    }
}
