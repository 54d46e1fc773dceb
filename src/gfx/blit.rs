use super::texture::Texture;

/// Screen-space rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Shrinks the rect so it stays inside a `width` x `height` framebuffer.
    /// Viewports outside the render target are a validation error in wgpu.
    pub fn clamped_to(&self, width: u32, height: u32) -> Rect {
        let w = self.w.min(width as f32 - self.x).max(0.0);
        let h = self.h.min(height as f32 - self.y).max(0.0);
        Rect::new(self.x, self.y, w, h)
    }
}

/// Where the result texture lands on screen, matching the fixed 256x256
/// on-screen rectangle at the origin that the debug display uses.
pub const DISPLAY_RECT: Rect = Rect::new(0.0, 0.0, 256.0, 256.0);

/// Largest rect with the source's aspect ratio that fits inside `dst`,
/// centered within it.
pub fn fit_rect(src_w: u32, src_h: u32, dst: Rect) -> Rect {
    if src_w == 0 || src_h == 0 || dst.w <= 0.0 || dst.h <= 0.0 {
        return Rect::new(dst.x, dst.y, 0.0, 0.0);
    }
    let scale = (dst.w / src_w as f32).min(dst.h / src_h as f32);
    let w = src_w as f32 * scale;
    let h = src_h as f32 * scale;
    Rect::new(
        dst.x + (dst.w - w) * 0.5,
        dst.y + (dst.h - h) * 0.5,
        w,
        h,
    )
}

/// Fullscreen-triangle pass that draws a texture through a viewport rect.
pub struct BlitPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl BlitPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    // This needs to match the filterable field of the corresponding Texture entry
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("blit_bind_group_layout"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/blit.wgsl").into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Self { pipeline, layout }
    }

    pub fn bind(&self, device: &wgpu::Device, texture: &Texture) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
            label: Some("blit_bind_group"),
        })
    }

    pub fn draw<'a>(
        &'a self,
        rp: &mut wgpu::RenderPass<'a>,
        bind_group: &'a wgpu::BindGroup,
        viewport: Rect,
    ) {
        if viewport.w <= 0.0 || viewport.h <= 0.0 {
            return;
        }
        rp.set_pipeline(&self.pipeline);
        rp.set_viewport(viewport.x, viewport.y, viewport.w, viewport.h, 0.0, 1.0);
        rp.set_bind_group(0, bind_group, &[]);
        rp.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_source_fills_display_rect() {
        let r = fit_rect(256, 256, DISPLAY_RECT);
        assert_eq!(r, DISPLAY_RECT);

        // Smaller square sources scale up to the full rect.
        let r = fit_rect(64, 64, DISPLAY_RECT);
        assert_eq!(r, DISPLAY_RECT);
    }

    #[test]
    fn wide_source_is_letterboxed() {
        let r = fit_rect(512, 256, DISPLAY_RECT);
        assert_eq!(r.w, 256.0);
        assert_eq!(r.h, 128.0);
        assert_eq!(r.x, 0.0);
        assert_eq!(r.y, 64.0);
    }

    #[test]
    fn tall_source_is_pillarboxed() {
        let r = fit_rect(128, 256, DISPLAY_RECT);
        assert_eq!(r.w, 128.0);
        assert_eq!(r.h, 256.0);
        assert_eq!(r.x, 64.0);
        assert_eq!(r.y, 0.0);
    }

    #[test]
    fn degenerate_source_collapses() {
        let r = fit_rect(0, 256, DISPLAY_RECT);
        assert_eq!(r.w, 0.0);
        assert_eq!(r.h, 0.0);
    }

    #[test]
    fn clamp_respects_small_framebuffers() {
        let r = DISPLAY_RECT.clamped_to(128, 512);
        assert_eq!(r, Rect::new(0.0, 0.0, 128.0, 256.0));

        let r = DISPLAY_RECT.clamped_to(512, 512);
        assert_eq!(r, DISPLAY_RECT);
    }
}
