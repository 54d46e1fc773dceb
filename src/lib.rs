//! Configures and dispatches a GPU compute kernel that approximates global
//! illumination from a G-buffer (albedo, normal, position) and a set of point
//! lights, then presents the result into a fixed on-screen rectangle.
//!
//! The interesting pieces live in [`gi::GiCompute`] (buffer sizing, resource
//! binding, the single dispatch per activation, and guaranteed release) and
//! [`eng::Viewer`] (the lifecycle driver that maps activation, per-frame draw
//! and teardown onto the dispatcher).

use std::path::PathBuf;

use cgmath::Vector3;
use log::info;

pub mod eng;
pub mod error;
pub mod gfx;
pub mod gi;

pub use error::{GiError, GiResult};
pub use gfx::{GpuContext, PointLight, Texture};
pub use gi::{GBuffer, GiCompute, GiConfig, OutputSize};

use eng::{Viewer, ViewerApp, ViewerWindow};
use gfx::blit::{fit_rect, BlitPass, DISPLAY_RECT};

/// Demo viewer: loads a G-buffer from three image paths given on the command
/// line (albedo, normal, position) or synthesizes a flat test scene, runs the
/// dispatcher once, and blits the result each frame.
struct GiViewer {
    gbuffer_paths: Option<[PathBuf; 3]>,
    lights: Vec<PointLight>,
    gi: GiCompute,
    blit: Option<BlitPass>,
    bind_group: Option<wgpu::BindGroup>,
}

impl GiViewer {
    fn new(gbuffer_paths: Option<[PathBuf; 3]>, lights: Vec<PointLight>) -> Self {
        Self {
            gbuffer_paths,
            lights,
            gi: GiCompute::new(),
            blit: None,
            bind_group: None,
        }
    }

    fn load_gbuffer(&self, window: &ViewerWindow) -> anyhow::Result<GBuffer> {
        match &self.gbuffer_paths {
            Some([albedo, normal, position]) => {
                info!("loading g-buffer from {:?}", albedo.parent());
                let load = |path: &PathBuf, label| -> GiResult<Texture> {
                    let bytes = std::fs::read(path)?;
                    Texture::from_bytes(window.device(), window.queue(), &bytes, Some(label))
                };
                Ok(GBuffer::new(
                    load(albedo, "albedo")?,
                    load(normal, "normal")?,
                    load(position, "position")?,
                ))
            }
            None => {
                info!("no g-buffer images supplied, using the synthetic test scene");
                Ok(GBuffer::synthetic(window.ctx(), 64, 64)?)
            }
        }
    }
}

impl ViewerApp for GiViewer {
    fn initialize(&mut self, window: &ViewerWindow) -> anyhow::Result<()> {
        let gbuffer = self.load_gbuffer(window)?;

        let config = GiConfig::new(OutputSize::Fixed {
            width: 256,
            height: 256,
        });
        self.gi
            .initialize(window.ctx(), &gbuffer, &self.lights, config, None)?;

        let blit = BlitPass::new(window.device(), window.surface_format());
        self.bind_group = Some(blit.bind(window.device(), self.gi.output()?));
        self.blit = Some(blit);
        Ok(())
    }

    fn present<'a>(
        &'a self,
        window: &ViewerWindow,
        rp: &mut wgpu::RenderPass<'a>,
    ) -> anyhow::Result<()> {
        let (blit, bind_group) = match (&self.blit, &self.bind_group) {
            (Some(blit), Some(bind_group)) => (blit, bind_group),
            _ => anyhow::bail!("present called before initialize"),
        };
        let output = self.gi.output()?;

        let size = window.size();
        let dst = DISPLAY_RECT.clamped_to(size.width, size.height);
        blit.draw(rp, bind_group, fit_rect(output.size.x, output.size.y, dst));
        Ok(())
    }

    fn release(&mut self) {
        self.bind_group = None;
        self.blit = None;
        self.gi.release();
    }
}

pub async fn run_demo() -> anyhow::Result<()> {
    let args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    let gbuffer_paths = match <[PathBuf; 3]>::try_from(args) {
        Ok(paths) => Some(paths),
        Err(args) if args.is_empty() => None,
        Err(_) => anyhow::bail!("usage: glimmer [<albedo> <normal> <position>]"),
    };

    let lights = vec![
        PointLight::new(
            Vector3::new(0.5, 1.2, 0.5),
            2.0,
            Vector3::new(1.0, 0.9, 0.7),
        ),
        PointLight::new(
            Vector3::new(0.1, 0.6, 0.9),
            0.5,
            Vector3::new(0.3, 0.5, 1.0),
        ),
    ];

    let app = GiViewer::new(gbuffer_paths, lights);
    Viewer::run(app, "glimmer", 256, 256).await
}
