use cgmath::Vector3;

/// A point light as the caller describes it: a position, an intensity on an
/// exposure-value scale, and a color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub intensity_ev: f32,
    pub color: Vector3<f32>,
}

impl PointLight {
    pub fn new(position: Vector3<f32>, intensity_ev: f32, color: Vector3<f32>) -> Self {
        Self {
            position,
            intensity_ev,
            color,
        }
    }

    pub fn to_raw(&self) -> PointLightRaw {
        PointLightRaw {
            position: self.position.into(),
            intensity_ev: self.intensity_ev,
            color: self.color.into(),
            _padding: 0.0,
        }
    }
}

/// Wire layout of one light record in the kernel's structured buffer.
/// NOTE :: the kernel expects a 32-byte stride (8 floats), so the trailing
/// padding float is part of the contract, not an implementation detail.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    position: [f32; 3],
    intensity_ev: f32,
    color: [f32; 3],
    _padding: f32,
}

impl PointLightRaw {
    pub const STRIDE: usize = std::mem::size_of::<PointLightRaw>();

    pub fn to_light(&self) -> PointLight {
        PointLight {
            position: self.position.into(),
            intensity_ev: self.intensity_ev,
            color: self.color.into(),
        }
    }
}

/// Converts lights into the kernel's wire records, preserving caller order.
pub fn to_raw_records(lights: &[PointLight]) -> Vec<PointLightRaw> {
    lights.iter().map(PointLight::to_raw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lights() -> Vec<PointLight> {
        vec![
            PointLight::new(
                Vector3::new(1.0, 2.0, 3.0),
                4.5,
                Vector3::new(1.0, 0.5, 0.25),
            ),
            PointLight::new(
                Vector3::new(-8.0, 0.0, 12.5),
                -2.0,
                Vector3::new(0.0, 1.0, 0.0),
            ),
            PointLight::new(Vector3::new(0.0, 0.0, 0.0), 0.0, Vector3::new(0.0, 0.0, 0.0)),
        ]
    }

    #[test]
    fn stride_is_32_bytes() {
        assert_eq!(PointLightRaw::STRIDE, 32);
    }

    #[test]
    fn buffer_length_matches_light_count() {
        let lights = sample_lights();
        let raw = to_raw_records(&lights);
        let bytes: &[u8] = bytemuck::cast_slice(&raw);
        assert_eq!(bytes.len(), lights.len() * 32);

        let empty = to_raw_records(&[]);
        let bytes: &[u8] = bytemuck::cast_slice(&empty);
        assert!(bytes.is_empty());
    }

    #[test]
    fn records_round_trip_in_order() {
        let lights = sample_lights();
        let raw = to_raw_records(&lights);
        let bytes: Vec<u8> = bytemuck::cast_slice(&raw).to_vec();

        let decoded: &[PointLightRaw] = bytemuck::cast_slice(&bytes);
        let restored: Vec<PointLight> = decoded.iter().map(PointLightRaw::to_light).collect();
        assert_eq!(restored, lights);
    }
}
