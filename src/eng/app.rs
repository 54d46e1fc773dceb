use log::{error, warn};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

use super::window::ViewerWindow;

/// The three lifecycle entry points the driver loop invokes, mapping the host
/// engine's activation / per-frame-draw / teardown callbacks one to one.
pub trait ViewerApp {
    /// Invoked once, before the first frame.
    fn initialize(&mut self, window: &ViewerWindow) -> anyhow::Result<()>;

    /// Invoked every display frame with an open render pass targeting the
    /// window surface.
    fn present<'a>(
        &'a self,
        window: &ViewerWindow,
        rp: &mut wgpu::RenderPass<'a>,
    ) -> anyhow::Result<()>;

    /// Invoked on teardown. Must be safe to call more than once.
    fn release(&mut self);
}

pub struct Viewer;

impl Viewer {
    /// Drives a [`ViewerApp`] with a winit event loop until the window closes.
    pub async fn run<A>(mut app: A, title: &str, width: u32, height: u32) -> anyhow::Result<()>
    where
        A: ViewerApp + 'static,
    {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height))
            .build(&event_loop)?;
        let mut window = ViewerWindow::from_winit(window).await?;

        app.initialize(&window)?;

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;

            match event {
                Event::WindowEvent {
                    ref event,
                    window_id,
                } if window_id == window.window_id() => match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => {
                        app.release();
                        *control_flow = ControlFlow::Exit;
                    }
                    WindowEvent::Resized(physical_size) => {
                        window.resize(*physical_size);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        window.resize(**new_inner_size);
                    }
                    _ => {}
                },
                Event::RedrawRequested(window_id) if window_id == window.window_id() => {
                    let frame = match window.surface_texture() {
                        Ok(frame) => frame,
                        Err(wgpu::SurfaceError::Lost) => {
                            window.resize(window.size());
                            return;
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            app.release();
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                        Err(e) => {
                            warn!("dropped frame: {:?}", e);
                            return;
                        }
                    };
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    let mut encoder = window
                        .ctx()
                        .create_command_encoder(Some("present encoder"));

                    {
                        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("present pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                    store: true,
                                },
                            })],
                            depth_stencil_attachment: None,
                        });

                        if let Err(e) = app.present(&window, &mut rp) {
                            error!("error while presenting frame: {:?}", e);
                        }
                    }

                    window.queue().submit(std::iter::once(encoder.finish()));
                    frame.present();
                }
                Event::MainEventsCleared => {
                    window.handle().request_redraw();
                }
                Event::LoopDestroyed => {
                    app.release();
                }
                _ => {}
            }
        });
    }
}
